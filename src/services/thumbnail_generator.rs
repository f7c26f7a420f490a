// src/services/thumbnail_generator.rs

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};

use crate::config::ResampleFilter;
use crate::error::ThumbnailError;

const BYTES_PER_PIXEL: u64 = 4;

/// Computes the output size for a scale request.
///
/// A missing or zero `target_height` is derived from the source aspect ratio,
/// rounding down. Both dimensions are clamped to at least 1.
pub fn target_dimensions(
    source_width: u32,
    source_height: u32,
    target_width: u32,
    target_height: Option<u32>,
) -> (u32, u32) {
    let width = target_width.max(1);
    let height = match target_height {
        Some(h) if h > 0 => h,
        _ => {
            let derived = u64::from(width) * u64::from(source_height) / u64::from(source_width.max(1));
            u32::try_from(derived).unwrap_or(u32::MAX)
        }
    };
    (width, height.max(1))
}

/// Stateless scaler producing RGBA thumbnails.
#[derive(Debug, Clone)]
pub struct ThumbnailGenerator {
    filter: FilterType,
    max_alloc: u64,
}

impl ThumbnailGenerator {
    pub fn new(filter: ResampleFilter, max_alloc: u64) -> Self {
        Self {
            filter: filter.into(),
            max_alloc,
        }
    }

    /// Scales `source` to `target_width` (and `target_height`, if given).
    /// `source` must be non-empty.
    pub fn scale(
        &self,
        source: &DynamicImage,
        target_width: u32,
        target_height: Option<u32>,
    ) -> RgbaImage {
        let (width, height) =
            target_dimensions(source.width(), source.height(), target_width, target_height);
        if (width, height) == (source.width(), source.height()) {
            return source.to_rgba8();
        }
        source.resize_exact(width, height, self.filter).into_rgba8()
    }

    /// Like `scale`, but refuses outputs whose pixel buffer would exceed the
    /// allocation budget.
    pub fn try_scale(
        &self,
        path: &Path,
        source: &DynamicImage,
        target_width: u32,
        target_height: Option<u32>,
    ) -> Result<RgbaImage, ThumbnailError> {
        let (width, height) =
            target_dimensions(source.width(), source.height(), target_width, target_height);
        let fits = u64::from(width)
            .checked_mul(u64::from(height))
            .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
            .is_some_and(|needed| needed <= self.max_alloc);
        if !fits {
            return Err(ThumbnailError::OutOfMemory(path.to_path_buf()));
        }
        Ok(self.scale(source, target_width, target_height))
    }
}
