use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use log::LevelFilter;

use thumbview::folder::list_images;
use thumbview::thumbnail::{cache_key, save_thumbnail, thumbnail_path};
use thumbview::{ChannelExecutor, Thumbnail, ThumbnailConfig, ThumbnailRequest, ThumbnailService};

#[derive(Parser, Debug)]
#[command(name = "thumbview", version, about = "Generate thumbnails for the images in a folder")]
struct Args {
    /// Folder containing the source images
    dir: PathBuf,

    /// Thumbnail width in pixels
    #[arg(short, long, default_value_t = 160)]
    width: u32,

    /// Thumbnail height; keeps the aspect ratio when omitted
    #[arg(long)]
    height: Option<u32>,

    /// Output folder (defaults to <DIR>/.thumbnails)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// JSON config file (defaults to the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Generate on the main thread instead of the worker pool
    #[arg(long)]
    sync: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("thumbview", LevelFilter::Debug)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(saved) => {
            log::info!("Wrote {} thumbnail(s)", saved);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ThumbnailConfig, thumbview::ConfigError> {
    match path {
        Some(path) => ThumbnailConfig::load(path),
        None => Ok(ThumbnailConfig::default_path()
            .map(|p| ThumbnailConfig::load_or_default(&p))
            .unwrap_or_default()),
    }
}

fn write_thumbnail(thumb: &Thumbnail, out_path: &Path) -> bool {
    match save_thumbnail(thumb, out_path) {
        Ok(()) => {
            log::debug!("Saved {}", out_path.display());
            true
        }
        Err(e) => {
            log::warn!("Failed to save thumbnail {}: {}", out_path.display(), e);
            false
        }
    }
}

fn run(args: &Args) -> Result<usize, Box<dyn std::error::Error>> {
    let config = load_config(args.config.as_deref())?;
    let out_dir = args
        .out
        .clone()
        .unwrap_or_else(|| args.dir.join(".thumbnails"));
    let images = list_images(&args.dir)?;
    log::info!("Found {} image(s) in {}", images.len(), args.dir.display());

    let (executor, queue) = ChannelExecutor::new();
    let service = ThumbnailService::new(&config, Arc::new(executor))?;

    let mut outputs: HashMap<String, PathBuf> = HashMap::new();
    let mut requests = Vec::with_capacity(images.len());
    for path in &images {
        let key = cache_key(&args.dir, path, args.width, args.height);
        let mut request = ThumbnailRequest::new(path, key.clone(), args.width);
        if let Some(height) = args.height {
            request = request.with_height(height);
        }
        outputs.insert(key, thumbnail_path(path, &out_dir, args.width));
        requests.push(request);
    }

    let mut saved = 0;
    if args.sync {
        for request in &requests {
            if let Some(thumb) = service.get_or_create_sync(request)? {
                if write_thumbnail(&thumb, &outputs[&request.key]) {
                    saved += 1;
                }
            }
        }
        return Ok(saved);
    }

    // Completed keys, filled by callbacks that run on this thread.
    let completed: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let mut retry = Vec::new();
    for request in requests {
        let key = request.key.clone();
        let completed = Arc::clone(&completed);
        let immediate = service.get_or_create_async(request.clone(), move |key| {
            if let Ok(mut done) = completed.lock() {
                done.push(key.to_string());
            }
        })?;
        match immediate {
            Some(thumb) => {
                if write_thumbnail(&thumb, &outputs[&key]) {
                    saved += 1;
                }
            }
            None => retry.push(request),
        }
    }

    loop {
        let idle = service.in_flight() == 0;
        queue.run_pending_timeout(Duration::from_millis(50));
        let done: Vec<String> = completed
            .lock()
            .map(|mut done| done.drain(..).collect())
            .unwrap_or_default();
        for key in done {
            // A small cache may already have evicted it; regenerate inline.
            let thumb = match service.cached(&key) {
                Some(thumb) => Some(thumb),
                None => retry
                    .iter()
                    .find(|r| r.key == key)
                    .and_then(|r| service.get_or_create_sync(r).ok().flatten()),
            };
            if let Some(thumb) = thumb {
                if write_thumbnail(&thumb, &outputs[&key]) {
                    saved += 1;
                }
            }
        }
        if idle {
            break;
        }
    }

    let stats = service.stats();
    log::info!(
        "Cache hits {}, misses {}, generated {}, failed {}",
        stats.hits,
        stats.misses,
        stats.generated,
        stats.failed
    );
    Ok(saved)
}
