//! Pipeline configuration
//!
//! All parameters have defaults tuned for screen recordings; there is no
//! persisted config file. The CLI populates this struct from flags.

use std::time::Duration;
use tracing::debug;
use crate::common::{KeyframeError, Result};

/// Longest side, in pixels, allowed for an extracted frame
pub const MAX_IMAGE_DIMENSION: u32 = 1568;

/// Settings for every stage of the key frame pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Scene-change score (0.0-1.0) above which a frame is a candidate
    pub scene_threshold: f64,
    /// Minimum spacing in seconds between kept candidates within a chunk
    pub min_interval: f64,
    /// Videos longer than this many seconds are split into chunks
    pub chunk_duration: f64,
    pub max_image_dimension: u32,
    /// Fraction of identical hash bits (0.0-1.0) at which a frame is a duplicate
    pub similarity_threshold: f64,
    /// Side length of the average hash grid (hash has `hash_size²` bits)
    pub hash_size: u32,
    /// Upper bound on chunks extracted concurrently
    pub max_workers: usize,
    /// Deadline for any single external toolchain call; calls that decode a
    /// whole chunk get at least three times the chunk's length
    pub command_timeout: Option<Duration>,
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scene_threshold: 0.3,
            min_interval: 5.0,
            chunk_duration: 600.0,
            max_image_dimension: MAX_IMAGE_DIMENSION,
            similarity_threshold: 0.90,
            hash_size: 16,
            // ffmpeg is itself multi-threaded, keep the pool small
            max_workers: num_cpus::get().clamp(1, 4),
            command_timeout: Some(Duration::from_secs(600)),
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Check that every parameter is in range
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.scene_threshold) {
            return Err(KeyframeError::config_error(format!(
                "scene_threshold must be within 0.0-1.0, got {}", self.scene_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(KeyframeError::config_error(format!(
                "similarity_threshold must be within 0.0-1.0, got {}", self.similarity_threshold
            )));
        }
        if !(self.min_interval > 0.0) {
            return Err(KeyframeError::config_error(format!(
                "min_interval must be positive, got {}", self.min_interval
            )));
        }
        if !(self.chunk_duration > 0.0) {
            return Err(KeyframeError::config_error(format!(
                "chunk_duration must be positive, got {}", self.chunk_duration
            )));
        }
        if self.max_image_dimension == 0 {
            return Err(KeyframeError::config_error("max_image_dimension must be positive"));
        }
        if self.hash_size == 0 || (self.hash_size as u64).pow(2) % 8 != 0 {
            return Err(KeyframeError::config_error(format!(
                "hash_size must be positive with hash_size² a multiple of 8, got {}", self.hash_size
            )));
        }
        if self.max_workers == 0 {
            return Err(KeyframeError::config_error("max_workers must be at least 1"));
        }
        if matches!(self.command_timeout, Some(t) if t.is_zero()) {
            return Err(KeyframeError::config_error("command_timeout must be non-zero"));
        }

        debug!("Validated pipeline configuration: {:?}", self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.scene_threshold, 0.3);
        assert_eq!(config.min_interval, 5.0);
        assert_eq!(config.chunk_duration, 600.0);
        assert_eq!(config.max_image_dimension, 1568);
        assert_eq!(config.similarity_threshold, 0.90);
        assert_eq!(config.hash_size, 16);
        assert!(config.max_workers >= 1 && config.max_workers <= 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_thresholds() {
        let config = PipelineConfig { scene_threshold: 1.5, ..Default::default() };
        assert!(matches!(config.validate(), Err(KeyframeError::InvalidConfig { .. })));

        let config = PipelineConfig { similarity_threshold: -0.1, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_positive_values() {
        let base = PipelineConfig::default();
        assert!(PipelineConfig { min_interval: 0.0, ..base.clone() }.validate().is_err());
        assert!(PipelineConfig { min_interval: f64::NAN, ..base.clone() }.validate().is_err());
        assert!(PipelineConfig { chunk_duration: -600.0, ..base.clone() }.validate().is_err());
        assert!(PipelineConfig { max_image_dimension: 0, ..base.clone() }.validate().is_err());
        assert!(PipelineConfig { hash_size: 0, ..base.clone() }.validate().is_err());
        assert!(PipelineConfig { hash_size: 6, ..base.clone() }.validate().is_err());
        assert!(PipelineConfig { hash_size: 8, ..base.clone() }.validate().is_ok());
        assert!(PipelineConfig { max_workers: 0, ..base.clone() }.validate().is_err());
        assert!(PipelineConfig { command_timeout: Some(Duration::ZERO), ..base.clone() }.validate().is_err());
        assert!(PipelineConfig { command_timeout: None, ..base }.validate().is_ok());
    }
}
