// src/services/thumbnail_service.rs

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use image::RgbaImage;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::ThumbnailConfig;
use crate::error::ThumbnailError;
use crate::services::bounded_cache::BoundedCache;
use crate::services::callback_executor::CallbackExecutor;
use crate::services::image_decoder::{DiskImageDecoder, ImageDecoder};
use crate::services::thumbnail_generator::ThumbnailGenerator;

/// A generated thumbnail. Immutable once built and shared through `Arc`.
#[derive(Debug)]
pub struct Thumbnail {
    key: String,
    image: RgbaImage,
}

impl Thumbnail {
    pub fn new(key: String, image: RgbaImage) -> Self {
        Self { key, image }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRequest {
    pub path: PathBuf,
    /// Caller-defined identity of the image + target size.
    pub key: String,
    pub width: u32,
    /// `None` keeps the source aspect ratio.
    pub height: Option<u32>,
    pub cache_eligible: bool,
}

impl ThumbnailRequest {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>, width: u32) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            width,
            height: None,
            cache_eligible: true,
        }
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn cache_eligible(mut self, eligible: bool) -> Self {
        self.cache_eligible = eligible;
        self
    }

    fn validate(&self) -> Result<(), ThumbnailError> {
        if self.key.is_empty() {
            return Err(ThumbnailError::InvalidArgument(format!(
                "empty thumbnail key for {}",
                self.path.display()
            )));
        }
        if self.path.as_os_str().is_empty() {
            return Err(ThumbnailError::InvalidArgument(format!(
                "empty image path for key {}",
                self.key
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub hits: u64,
    pub misses: u64,
    pub generated: u64,
    pub failed: u64,
    pub out_of_memory_clears: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    generated: AtomicU64,
    failed: AtomicU64,
    out_of_memory_clears: AtomicU64,
}

pub type CompletionCallback = Box<dyn FnOnce(&str) + Send + 'static>;

struct Waiter {
    executor: Arc<dyn CallbackExecutor>,
    on_complete: CompletionCallback,
}

/// State reachable from worker threads.
/// Releases one in-flight slot when the task ends, even if a callback panics.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Shared {
    cache: BoundedCache<Arc<Thumbnail>>,
    decoder: Arc<dyn ImageDecoder>,
    generator: ThumbnailGenerator,
    counters: Counters,
    in_flight: AtomicUsize,
    deduplicate: bool,
    // key -> callbacks waiting on the one running task; only used with `deduplicate`.
    waiting: Mutex<HashMap<String, Vec<Waiter>>>,
}

impl Shared {
    fn lookup(&self, key: &str) -> Option<Arc<Thumbnail>> {
        match self.cache.get(key) {
            Some(thumb) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                log::debug!("Thumbnail cache hit: {}", key);
                Some(thumb)
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn decode_and_scale(&self, request: &ThumbnailRequest) -> Result<RgbaImage, ThumbnailError> {
        let source = self.decoder.decode(&request.path)?;
        self.generator
            .try_scale(&request.path, &source, request.width, request.height)
    }

    /// Decodes and scales one request. Never fails loudly: every error is
    /// logged and turned into `None`.
    fn generate(&self, request: &ThumbnailRequest) -> Option<Arc<Thumbnail>> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.decode_and_scale(request)))
            .unwrap_or_else(|_| {
                Err(ThumbnailError::CorruptData(
                    request.path.clone(),
                    "decoder panicked".to_string(),
                ))
            });

        match outcome {
            Ok(image) => {
                let thumb = Arc::new(Thumbnail::new(request.key.clone(), image));
                if request.cache_eligible {
                    self.cache.put(request.key.clone(), Arc::clone(&thumb));
                }
                self.counters.generated.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "Generated thumbnail {} ({}x{})",
                    request.key,
                    thumb.width(),
                    thumb.height()
                );
                Some(thumb)
            }
            Err(e) if e.is_out_of_memory() => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .out_of_memory_clears
                    .fetch_add(1, Ordering::Relaxed);
                self.cache.clear();
                log::warn!("{}. Thumbnail cache cleared to free memory.", e);
                None
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                log::warn!("Failed to generate thumbnail {}: {}", request.key, e);
                None
            }
        }
    }

    fn take_waiters(&self, key: &str) -> Vec<Waiter> {
        self.waiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .unwrap_or_default()
    }

    fn notify(waiters: Vec<Waiter>, key: &str) {
        for waiter in waiters {
            let key = key.to_string();
            let on_complete = waiter.on_complete;
            waiter
                .executor
                .execute(Box::new(move || on_complete(&key)));
        }
    }
}

/// Cache-aware thumbnail retrieval with blocking and non-blocking modes.
pub struct ThumbnailService {
    shared: Arc<Shared>,
    pool: ThreadPool,
    executor: Arc<dyn CallbackExecutor>,
    workers: usize,
}

impl ThumbnailService {
    /// Builds a service decoding from disk. Async completions run on `executor`
    /// unless a request names its own.
    pub fn new(
        config: &ThumbnailConfig,
        executor: Arc<dyn CallbackExecutor>,
    ) -> Result<Self, ThumbnailError> {
        let decoder = Arc::new(DiskImageDecoder::new(config.max_decode_bytes));
        Self::with_decoder(config, decoder, executor)
    }

    pub fn with_decoder(
        config: &ThumbnailConfig,
        decoder: Arc<dyn ImageDecoder>,
        executor: Arc<dyn CallbackExecutor>,
    ) -> Result<Self, ThumbnailError> {
        config.validate()?;
        let capacity = config.cache_capacity()?;
        let workers = config.resolved_worker_threads();

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("thumbnail-worker-{}", i))
            .panic_handler(|_| log::error!("Thumbnail worker task panicked"))
            .build()?;

        log::info!(
            "ThumbnailService: cache capacity {}, {} worker thread(s)",
            capacity,
            workers
        );

        Ok(Self {
            shared: Arc::new(Shared {
                cache: BoundedCache::new(capacity),
                decoder,
                generator: ThumbnailGenerator::new(config.filter, config.max_decode_bytes),
                counters: Counters::default(),
                in_flight: AtomicUsize::new(0),
                deduplicate: config.deduplicate_in_flight,
                waiting: Mutex::new(HashMap::new()),
            }),
            pool,
            executor,
            workers,
        })
    }

    /// Returns the cached thumbnail for `request.key`, or decodes and scales
    /// it on the calling thread. `Ok(None)` means generation failed.
    ///
    /// Only a malformed request (empty key or path) is an `Err`.
    pub fn get_or_create_sync(
        &self,
        request: &ThumbnailRequest,
    ) -> Result<Option<Arc<Thumbnail>>, ThumbnailError> {
        validate(request)?;
        if let Some(thumb) = self.shared.lookup(&request.key) {
            return Ok(Some(thumb));
        }
        Ok(self.shared.generate(request))
    }

    /// Returns a cached thumbnail immediately, or `Ok(None)` after queueing
    /// generation on the worker pool. On success `on_complete(key)` runs on
    /// the service's executor; on failure it is never called.
    pub fn get_or_create_async<F>(
        &self,
        request: ThumbnailRequest,
        on_complete: F,
    ) -> Result<Option<Arc<Thumbnail>>, ThumbnailError>
    where
        F: FnOnce(&str) + Send + 'static,
    {
        let executor = Arc::clone(&self.executor);
        self.get_or_create_async_on(request, executor, on_complete)
    }

    /// As `get_or_create_async`, with the completion delivered on `executor`.
    pub fn get_or_create_async_on<F>(
        &self,
        request: ThumbnailRequest,
        executor: Arc<dyn CallbackExecutor>,
        on_complete: F,
    ) -> Result<Option<Arc<Thumbnail>>, ThumbnailError>
    where
        F: FnOnce(&str) + Send + 'static,
    {
        validate(&request)?;
        if let Some(thumb) = self.shared.lookup(&request.key) {
            return Ok(Some(thumb));
        }

        let waiter = Waiter {
            executor,
            on_complete: Box::new(on_complete),
        };

        if self.shared.deduplicate {
            let mut waiting = self
                .shared
                .waiting
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(waiters) = waiting.get_mut(&request.key) {
                log::debug!("Joining in-flight generation for {}", request.key);
                waiters.push(waiter);
                return Ok(None);
            }
            waiting.insert(request.key.clone(), vec![waiter]);
            drop(waiting);
            self.submit(request, Vec::new());
        } else {
            self.submit(request, vec![waiter]);
        }
        Ok(None)
    }

    fn submit(&self, request: ThumbnailRequest, waiters: Vec<Waiter>) {
        let shared = Arc::clone(&self.shared);
        shared.in_flight.fetch_add(1, Ordering::SeqCst);
        self.pool.spawn(move || {
            let _in_flight = InFlightGuard(&shared.in_flight);
            let result = shared.generate(&request);
            let mut waiters = waiters;
            if shared.deduplicate {
                waiters.extend(shared.take_waiters(&request.key));
            }
            if result.is_some() {
                Shared::notify(waiters, &request.key);
            } else {
                log::debug!(
                    "No completion for {}; {} waiter(s) keep their placeholder",
                    request.key,
                    waiters.len()
                );
            }
        });
    }

    /// Cached thumbnail for `key`, if present. Never generates.
    pub fn cached(&self, key: &str) -> Option<Arc<Thumbnail>> {
        self.shared.cache.get(key)
    }

    /// Drops one cached entry, e.g. after its source file changed.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.shared.cache.remove(key);
        if removed {
            log::debug!("Invalidated thumbnail {}", key);
        }
        removed
    }

    pub fn clear(&self) {
        self.shared.cache.clear();
        log::debug!("Thumbnail cache cleared");
    }

    pub fn stats(&self) -> ServiceStats {
        let c = &self.shared.counters;
        ServiceStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            generated: c.generated.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            out_of_memory_clears: c.out_of_memory_clears.load(Ordering::Relaxed),
        }
    }

    /// Async generation tasks submitted but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    pub fn cache_len(&self) -> usize {
        self.shared.cache.size()
    }

    pub fn cache_capacity(&self) -> usize {
        self.shared.cache.capacity()
    }

    pub fn worker_threads(&self) -> usize {
        self.workers
    }
}

fn validate(request: &ThumbnailRequest) -> Result<(), ThumbnailError> {
    request
        .validate()
        .inspect_err(|e| log::error!("ThumbnailService: rejected request: {}", e))
}

impl fmt::Debug for ThumbnailService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailService")
            .field("cache", &self.shared.cache)
            .field("workers", &self.workers)
            .field("in_flight", &self.in_flight())
            .field("deduplicate", &self.shared.deduplicate)
            .finish()
    }
}
