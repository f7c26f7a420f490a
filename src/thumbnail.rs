use std::fs;
use std::path::{Component, Path, PathBuf};

use image::ImageFormat;

use crate::error::ThumbnailError;
use crate::services::thumbnail_service::Thumbnail;

/// Cache key for `img_path` at a target size: the path relative to `root`,
/// joined with forward slashes, plus the requested dimensions.
pub fn cache_key(root: &Path, img_path: &Path, width: u32, height: Option<u32>) -> String {
    let relative = img_path.strip_prefix(root).unwrap_or(img_path);
    let normalized = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    match height {
        Some(h) if h > 0 => format!("{}@{}x{}", normalized, width, h),
        _ => format!("{}@{}", normalized, width),
    }
}

/// Returns the path for a thumbnail of a given image at a given width.
/// The source extension is part of the name, so `a.png` and `a.jpg` in one
/// folder never share an output file.
pub fn thumbnail_path(img_path: &Path, thumb_dir: &Path, width: u32) -> PathBuf {
    let stem = img_path.file_stem().unwrap_or_default().to_string_lossy();
    match img_path.extension() {
        Some(ext) => thumb_dir.join(format!("{}_{}_{}.webp", stem, ext.to_string_lossy(), width)),
        None => thumb_dir.join(format!("{}_{}.webp", stem, width)),
    }
}

/// Writes `thumb` as WebP, creating parent directories as needed.
pub fn save_thumbnail(thumb: &Thumbnail, path: &Path) -> Result<(), ThumbnailError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ThumbnailError::Io(parent.to_path_buf(), e))?;
    }
    thumb
        .image()
        .save_with_format(path, ImageFormat::WebP)
        .map_err(|e| ThumbnailError::from_image_error(path, e))
}
