// src/error.rs

use std::io;
use std::path::{Path, PathBuf};

use image::ImageError;

#[derive(Debug)]
pub enum ThumbnailError {
    NotFound(PathBuf),
    UnsupportedFormat(PathBuf, String),
    CorruptData(PathBuf, String),
    OutOfMemory(PathBuf),
    InvalidArgument(String),
    Io(PathBuf, io::Error),
    WorkerPool(String),
}

impl ThumbnailError {
    /// Maps an `image` crate error raised while working on `path`.
    pub fn from_image_error(path: &Path, err: ImageError) -> Self {
        let path = path.to_path_buf();
        match err {
            ImageError::IoError(io_err) if io_err.kind() == io::ErrorKind::NotFound => {
                ThumbnailError::NotFound(path)
            }
            ImageError::IoError(io_err)
                if matches!(
                    io_err.kind(),
                    io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData
                ) =>
            {
                ThumbnailError::CorruptData(path, io_err.to_string())
            }
            ImageError::IoError(io_err) => ThumbnailError::Io(path, io_err),
            ImageError::Unsupported(e) => ThumbnailError::UnsupportedFormat(path, e.to_string()),
            ImageError::Limits(_) => ThumbnailError::OutOfMemory(path),
            // Decoding, Parameter and Encoding errors all mean the bytes were unusable.
            other => ThumbnailError::CorruptData(path, other.to_string()),
        }
    }

    pub fn from_io_error(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            ThumbnailError::NotFound(path.to_path_buf())
        } else {
            ThumbnailError::Io(path.to_path_buf(), err)
        }
    }

    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, ThumbnailError::OutOfMemory(_))
    }
}

impl std::fmt::Display for ThumbnailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThumbnailError::NotFound(path) => write!(f, "Image not found: {}", path.display()),
            ThumbnailError::UnsupportedFormat(path, msg) => {
                write!(f, "Unsupported image format {}: {}", path.display(), msg)
            }
            ThumbnailError::CorruptData(path, msg) => {
                write!(f, "Corrupt image data {}: {}", path.display(), msg)
            }
            ThumbnailError::OutOfMemory(path) => {
                write!(f, "Out of memory while processing {}", path.display())
            }
            ThumbnailError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            ThumbnailError::Io(path, err) => write!(f, "I/O error on {}: {}", path.display(), err),
            ThumbnailError::WorkerPool(msg) => write!(f, "Worker pool error: {}", msg),
        }
    }
}

impl std::error::Error for ThumbnailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ThumbnailError::Io(_, err) => Some(err),
            _ => None,
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for ThumbnailError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        ThumbnailError::WorkerPool(err.to_string())
    }
}

impl From<ConfigError> for ThumbnailError {
    fn from(err: ConfigError) -> Self {
        ThumbnailError::InvalidArgument(err.to_string())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    IoError(io::Error),
    ParseError(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(err) => write!(f, "Config IO error: {}", err),
            ConfigError::ParseError(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::error::{LimitError, LimitErrorKind};

    #[test]
    fn limits_error_maps_to_out_of_memory() {
        let err = ImageError::Limits(LimitError::from_kind(LimitErrorKind::InsufficientMemory));
        let mapped = ThumbnailError::from_image_error(Path::new("big.png"), err);
        assert!(mapped.is_out_of_memory());
    }

    #[test]
    fn missing_file_io_error_maps_to_not_found() {
        let err = ImageError::IoError(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let mapped = ThumbnailError::from_image_error(Path::new("gone.png"), err);
        assert!(matches!(mapped, ThumbnailError::NotFound(p) if p == Path::new("gone.png")));
    }
}
