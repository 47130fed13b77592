//! Key frame extraction for screen recordings
//!
//! This crate turns a screen-recording video into a deduplicated, time-ordered
//! set of representative stills. Long videos are split into stream-copied
//! chunks, each chunk is scanned for scene changes (with uniform sampling as a
//! fallback for static footage), and the merged frames are thinned with a
//! perceptual average hash.
//!
//! All decoding and encoding is delegated to the external `ffmpeg` and
//! `ffprobe` binaries.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use keyframe_extract::{KeyframePipeline, PipelineConfig};
//!
//! let pipeline = KeyframePipeline::new(PipelineConfig::default())?;
//! let keyframes = pipeline.run(Path::new("recording.mp4"), Path::new("work"))?;
//! for frame in &keyframes.frames {
//!     println!("{:.2}s -> {}", frame.timestamp, frame.path.display());
//! }
//! # Ok::<(), keyframe_extract::KeyframeError>(())
//! ```
//!
//! Reloading an already-extracted frame set without recomputation:
//!
//! ```rust,no_run
//! use std::path::Path;
//! use keyframe_extract::load_frames_from_directory;
//!
//! let frames = load_frames_from_directory(Path::new("work/frames"))?;
//! println!("{} frames", frames.len());
//! # Ok::<(), keyframe_extract::KeyframeError>(())
//! ```

mod common;
mod config;
mod coordinator;
mod dedup;
mod extractor;
mod interval_filter;
mod manifest;
mod pipeline;
mod probe;
mod resize;
mod scene;
mod segmenter;
mod toolchain;

#[cfg(test)]
mod test_support;

// Re-export main types for public API
pub use common::{Chunk, Frame, KeyframeError, Result, VideoInfo};
pub use config::{PipelineConfig, MAX_IMAGE_DIMENSION};
pub use coordinator::{coordinate_chunks, frames_dir_for, merge_chunk_frames};
pub use dedup::{average_hash, deduplicate_frames, plan_deduplication, DedupPlan, PerceptualHash};
pub use extractor::SceneFrameExtractor;
pub use interval_filter::{enforce_min_interval, select_candidates, IntervalFilter};
pub use manifest::{load_frames_from_directory, parse_frame_filename, FrameManifest, ManifestEntry};
pub use pipeline::{KeyframePipeline, KeyframeSet, FRAMES_DIR};
pub use probe::{parse_frame_rate, probe_video};
pub use resize::{resize_if_needed, target_dimensions};
pub use scene::{detect_scene_changes, parse_scene_timestamps};
pub use segmenter::{plan_chunk_count, split_video, CHUNKS_DIR};
pub use toolchain::{ToolCommand, ToolOutput, Toolchain};

use tracing::info;

/// Initialize tracing for the library
///
/// Call this once at the start of your application to enable log output.
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Arguments
/// * `level` - Tracing level filter (e.g., "debug", "info", "warn", "error")
pub fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    info!("Key frame extraction initialized with tracing level: {}", level);
}
