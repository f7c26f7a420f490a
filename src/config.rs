// src/config.rs

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 200;
pub const DEFAULT_MAX_DECODE_BYTES: u64 = 512 * 1024 * 1024;

/// Resampling filter used when scaling thumbnails.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResampleFilter {
    Nearest,
    #[default]
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResampleFilter> for FilterType {
    fn from(filter: ResampleFilter) -> Self {
        match filter {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Gaussian => FilterType::Gaussian,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Settings for a `ThumbnailService`. Resolved by the embedding application
/// and handed to the service constructor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ThumbnailConfig {
    pub max_cache_entries: usize,
    /// `None` means half of the available parallelism, at least one.
    pub worker_threads: Option<usize>,
    pub max_decode_bytes: u64,
    pub filter: ResampleFilter,
    pub deduplicate_in_flight: bool,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_cache_entries: DEFAULT_MAX_CACHE_ENTRIES,
            worker_threads: None,
            max_decode_bytes: DEFAULT_MAX_DECODE_BYTES,
            filter: ResampleFilter::default(),
            deduplicate_in_flight: false,
        }
    }
}

impl ThumbnailConfig {
    /// `<config_dir>/thumbview/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("thumbview").join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        let config: ThumbnailConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            log::warn!(
                "Failed to load config {}: {}. Using defaults.",
                path.display(),
                e
            );
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        Ok(fs::write(path, json)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cache_entries == 0 {
            return Err(ConfigError::InvalidValue(
                "max_cache_entries must be greater than 0".to_string(),
            ));
        }
        if self.max_decode_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "max_decode_bytes must be greater than 0".to_string(),
            ));
        }
        if self.worker_threads == Some(0) {
            return Err(ConfigError::InvalidValue(
                "worker_threads must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cache_capacity(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.max_cache_entries).ok_or_else(|| {
            ConfigError::InvalidValue("max_cache_entries must be greater than 0".to_string())
        })
    }

    pub fn resolved_worker_threads(&self) -> usize {
        match self.worker_threads {
            Some(n) => n.max(1),
            None => std::thread::available_parallelism()
                .map(|n| n.get() / 2)
                .unwrap_or(1)
                .max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_documented_values() {
        let config = ThumbnailConfig::default();
        assert_eq!(config.max_cache_entries, 200);
        assert_eq!(config.filter, ResampleFilter::Triangle);
        assert!(!config.deduplicate_in_flight);
        assert!(config.resolved_worker_threads() >= 1);
    }

    #[test]
    fn partial_json_falls_back_to_defaults_for_missing_fields() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{ "max_cache_entries": 16, "filter": "lanczos3" }"#)
            .expect("Failed to write config");

        let config = ThumbnailConfig::load(&path).expect("Config should load");
        assert_eq!(config.max_cache_entries, 16);
        assert_eq!(config.filter, ResampleFilter::Lanczos3);
        assert_eq!(config.max_decode_bytes, DEFAULT_MAX_DECODE_BYTES);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{ "max_cache_entries": 0 }"#).expect("Failed to write config");

        assert!(matches!(
            ThumbnailConfig::load(&path),
            Err(ConfigError::InvalidValue(_))
        ));
        assert_eq!(ThumbnailConfig::load_or_default(&path), ThumbnailConfig::default());
    }

    #[test]
    fn save_then_load_keeps_settings() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nested").join("config.json");
        let config = ThumbnailConfig {
            max_cache_entries: 42,
            worker_threads: Some(3),
            deduplicate_in_flight: true,
            ..ThumbnailConfig::default()
        };
        config.save(&path).expect("Config should save");

        let loaded = ThumbnailConfig::load(&path).expect("Config should load");
        assert_eq!(loaded, config);
        assert_eq!(loaded.resolved_worker_threads(), 3);
    }
}
