// Shared test utilities: fixture images and mock decoders for the thumbnail services.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use tempfile::TempDir;

use crate::config::ThumbnailConfig;
use crate::error::ThumbnailError;
use crate::services::callback_executor::InlineExecutor;
use crate::services::image_decoder::ImageDecoder;
use crate::services::thumbnail_service::ThumbnailService;

/// Failure a `MockDecoder` should report for a given path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    NotFound,
    Corrupt,
    OutOfMemory,
    Panic,
}

/// Decoder returning a solid image of fixed size, with per-path failures.
pub struct MockDecoder {
    pub width: u32,
    pub height: u32,
    pub calls: AtomicUsize,
    failures: Mutex<HashMap<PathBuf, MockFailure>>,
}

impl MockDecoder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            calls: AtomicUsize::new(0),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn fail_on(&self, path: impl Into<PathBuf>, failure: MockFailure) {
        self.failures.lock().unwrap().insert(path.into(), failure);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for MockDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDecoder")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("calls", &self.call_count())
            .finish()
    }
}

impl ImageDecoder for MockDecoder {
    fn decode(&self, path: &Path) -> Result<DynamicImage, ThumbnailError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.failures.lock().unwrap().get(path).copied();
        match failure {
            Some(MockFailure::NotFound) => Err(ThumbnailError::NotFound(path.to_path_buf())),
            Some(MockFailure::Corrupt) => Err(ThumbnailError::CorruptData(
                path.to_path_buf(),
                "mock corrupt data".to_string(),
            )),
            Some(MockFailure::OutOfMemory) => Err(ThumbnailError::OutOfMemory(path.to_path_buf())),
            Some(MockFailure::Panic) => panic!("mock decoder panic for {}", path.display()),
            None => Ok(DynamicImage::new_rgba8(self.width, self.height)),
        }
    }
}

/// A decode parked inside `BlockingDecoder`, waiting for its own release.
pub struct StartedDecode {
    pub path: PathBuf,
    release: Sender<()>,
}

impl StartedDecode {
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

/// Decoder that announces each decode and blocks it until that decode's
/// `StartedDecode` is released. Decodes never wait on each other.
pub struct BlockingDecoder {
    pub calls: AtomicUsize,
    started_tx: Mutex<Sender<StartedDecode>>,
}

impl BlockingDecoder {
    pub fn new() -> (Self, Receiver<StartedDecode>) {
        let (started_tx, started) = mpsc::channel();
        (
            Self {
                calls: AtomicUsize::new(0),
                started_tx: Mutex::new(started_tx),
            },
            started,
        )
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageDecoder for BlockingDecoder {
    fn decode(&self, path: &Path) -> Result<DynamicImage, ThumbnailError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (release, released) = mpsc::channel();
        let started = StartedDecode {
            path: path.to_path_buf(),
            release,
        };
        let _ = self.started_tx.lock().unwrap().send(started);
        released.recv_timeout(Duration::from_secs(10)).map_err(|_| {
            ThumbnailError::CorruptData(path.to_path_buf(), "never released".to_string())
        })?;
        Ok(DynamicImage::new_rgba8(80, 40))
    }
}

pub fn test_config(max_cache_entries: usize) -> ThumbnailConfig {
    ThumbnailConfig {
        max_cache_entries,
        worker_threads: Some(2),
        ..ThumbnailConfig::default()
    }
}

/// Service over `decoder` with callbacks run inline on the worker thread.
pub fn service_with_decoder(
    config: &ThumbnailConfig,
    decoder: Arc<dyn ImageDecoder>,
) -> ThumbnailService {
    ThumbnailService::with_decoder(config, decoder, Arc::new(InlineExecutor))
        .expect("Failed to build ThumbnailService for test")
}

/// Polls until no async generation is running. Panics after `timeout`.
pub fn wait_until_idle(service: &ThumbnailService, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while service.in_flight() > 0 {
        assert!(
            Instant::now() < deadline,
            "ThumbnailService still had {} task(s) in flight",
            service.in_flight()
        );
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Scratch folders for one test: source images and written thumbnails.
/// Both are removed when the value is dropped.
pub struct ImageFixtures {
    _root: TempDir,
    pub images: PathBuf,
    pub thumbs: PathBuf,
}

impl ImageFixtures {
    pub fn new() -> Self {
        let root = TempDir::new().expect("temp dir for image fixtures");
        let images = root.path().join("images");
        let thumbs = root.path().join("thumbs");
        for dir in [&images, &thumbs] {
            std::fs::create_dir_all(dir).expect("fixture subdirectory");
        }
        Self {
            _root: root,
            images,
            thumbs,
        }
    }

    pub fn image(&self, name: &str) -> PathBuf {
        self.images.join(name)
    }

    pub fn thumb(&self, name: &str) -> PathBuf {
        self.thumbs.join(name)
    }

    /// Writes a `width` x `height` black and white checker PNG into `images`.
    pub fn write_png(&self, name: &str, width: u32, height: u32) -> PathBuf {
        let path = self.image(name);
        let checker = ImageBuffer::from_fn(width, height, |x, y| {
            let v: u8 = if (x + y) % 2 == 0 { 0 } else { 255 };
            Rgba([v, v, v, 255])
        });
        checker
            .save_with_format(&path, ImageFormat::Png)
            .unwrap_or_else(|e| panic!("writing fixture {}: {}", path.display(), e));
        path
    }
}
