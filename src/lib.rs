//! Bounded, thread-safe thumbnail cache with synchronous and worker-pool
//! backed asynchronous generation.

pub mod config;
pub mod error;
pub mod folder;
pub mod services;
pub mod thumbnail;

#[cfg(test)]
mod tests_common;

pub use config::{ResampleFilter, ThumbnailConfig};
pub use error::{ConfigError, ThumbnailError};
pub use services::bounded_cache::BoundedCache;
pub use services::callback_executor::{
    CallbackExecutor, CallbackQueue, ChannelExecutor, InlineExecutor,
};
pub use services::image_decoder::{DiskImageDecoder, ImageDecoder};
pub use services::thumbnail_generator::ThumbnailGenerator;
pub use services::thumbnail_service::{
    ServiceStats, Thumbnail, ThumbnailRequest, ThumbnailService,
};
