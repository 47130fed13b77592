//! Common types, utilities, and error handling for the key frame pipeline.
//!
//! This module provides the foundational types used throughout the codebase,
//! including probed video metadata, chunks, extracted frames, and the error
//! taxonomy shared by every pipeline stage.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

/// Video metadata produced once per probed file
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
}

impl VideoInfo {
    /// Get a human-readable description of the video
    pub fn description(&self) -> String {
        format!(
            "{}x{} {} at {:.2}fps ({:.1}s duration)",
            self.width, self.height, self.codec, self.fps, self.duration
        )
    }

    /// Check if this appears to be a usable video
    pub fn is_valid(&self) -> bool {
        self.fps > 0.0
            && self.width > 0
            && self.height > 0
            && self.duration >= 0.0
    }
}

/// A time-bounded segment of the source video
///
/// `time_offset` is the amount to add to any timestamp measured inside this
/// chunk to recover its position in the original video. It assumes exact
/// chunk boundaries; stream-copy splitting may snap to a nearby keyframe.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub path: PathBuf,
    pub index: usize,
    pub time_offset: f64,
}

impl Chunk {
    /// Create a chunk at the given ordinal position
    pub fn new(path: impl Into<PathBuf>, index: usize, chunk_duration: f64) -> Self {
        Self {
            path: path.into(),
            index,
            time_offset: index as f64 * chunk_duration,
        }
    }

    /// The single chunk used when no segmentation happens
    pub fn whole(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            index: 0,
            time_offset: 0.0,
        }
    }

    /// Name used for the per-chunk frames subdirectory
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("chunk_{:03}", self.index))
    }
}

/// A still frame on disk
///
/// The timestamp is absolute (seconds into the original video) once the
/// chunk coordinator has applied the chunk offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub path: PathBuf,
    pub timestamp: f64,
    pub index: usize,
}

impl Frame {
    pub fn new(path: impl Into<PathBuf>, timestamp: f64, index: usize) -> Self {
        Self {
            path: path.into(),
            timestamp,
            index,
        }
    }

    /// Filename encoding index and timestamp, e.g. `frame_0003_45.00s.jpg`
    pub fn filename(index: usize, timestamp: f64) -> String {
        format!("frame_{:04}_{:.2}s.jpg", index, timestamp)
    }

    /// Shift this frame's timestamp by a chunk offset
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn offset_by(mut self, seconds: f64) -> Self {
        debug!("Offsetting frame at {:.2}s by {:.2}s", self.timestamp, seconds);
        self.timestamp += seconds;
        self
    }

    /// Whether the backing file is still present
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// All possible errors from the key frame pipeline
///
/// Every variant is fatal for the run; nothing is recovered locally.
#[derive(Debug, thiserror::Error)]
pub enum KeyframeError {
    #[error("Required binary not available: {binary}")]
    MissingDependency { binary: String },

    #[error("Video file not found: {path}")]
    VideoNotFound { path: String },

    #[error("Invalid video {path}: {reason}")]
    InvalidVideo { path: String, reason: String },

    #[error("Failed to launch {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    SubprocessFailed { program: String, status: String, stderr: String },

    #[error("{program} timed out after {timeout:?}")]
    SubprocessTimeout { program: String, timeout: Duration },

    #[error("{program} did not produce expected output: {path}")]
    MissingOutput { program: String, path: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Image processing failed for {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl KeyframeError {
    /// Create a configuration error with a descriptive message
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    /// Create an invalid-video error for the given path
    pub fn invalid_video(path: &Path, reason: impl Into<String>) -> Self {
        Self::InvalidVideo {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    /// Wrap an image crate error with the file it concerns
    pub fn image_error(path: &Path, source: image::ImageError) -> Self {
        Self::Image {
            path: path.display().to_string(),
            source,
        }
    }

    /// Create an internal error (for unexpected conditions)
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError { message: message.into() }
    }
}

/// Convenient Result type for pipeline operations
pub type Result<T> = std::result::Result<T, KeyframeError>;
