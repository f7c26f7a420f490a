// src/services/image_decoder.rs

use std::fmt;
use std::path::Path;

use image::{DynamicImage, ImageDecoder as _, ImageReader, Limits};

use crate::config::DEFAULT_MAX_DECODE_BYTES;
use crate::error::ThumbnailError;

/// Loads a full-resolution, display-ready raster from a path.
///
/// Implementations perform no caching; the service owns that.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DynamicImage, ThumbnailError>;
}

/// Decodes files from disk with the `image` crate, applying EXIF orientation.
#[derive(Clone)]
pub struct DiskImageDecoder {
    max_alloc: u64,
}

impl DiskImageDecoder {
    pub fn new(max_alloc: u64) -> Self {
        Self { max_alloc }
    }

    fn limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_alloc);
        limits
    }
}

impl Default for DiskImageDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DECODE_BYTES)
    }
}

impl fmt::Debug for DiskImageDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskImageDecoder")
            .field("max_alloc", &self.max_alloc)
            .finish()
    }
}

impl ImageDecoder for DiskImageDecoder {
    fn decode(&self, path: &Path) -> Result<DynamicImage, ThumbnailError> {
        if !path.is_file() {
            return Err(ThumbnailError::NotFound(path.to_path_buf()));
        }

        let mut reader = ImageReader::open(path)
            .map_err(|e| ThumbnailError::from_io_error(path, e))?
            .with_guessed_format()
            .map_err(|e| ThumbnailError::from_io_error(path, e))?;
        reader.limits(self.limits());

        let mut decoder = reader
            .into_decoder()
            .map_err(|e| ThumbnailError::from_image_error(path, e))?;
        if decoder.total_bytes() > self.max_alloc {
            return Err(ThumbnailError::OutOfMemory(path.to_path_buf()));
        }
        let orientation = decoder
            .orientation()
            .map_err(|e| ThumbnailError::from_image_error(path, e))?;
        let mut img = DynamicImage::from_decoder(decoder)
            .map_err(|e| ThumbnailError::from_image_error(path, e))?;
        img.apply_orientation(orientation);

        if img.width() == 0 || img.height() == 0 {
            return Err(ThumbnailError::CorruptData(
                path.to_path_buf(),
                "decoded image is empty".to_string(),
            ));
        }
        Ok(img)
    }
}
