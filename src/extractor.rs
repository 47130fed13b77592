//! Scene Frame Extractor
//!
//! For one video (a chunk or the whole input) this runs scene detection,
//! filters the candidate timestamps, captures one still per candidate, and
//! downscales oversized stills.

use rayon::prelude::*;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};
use crate::common::{Frame, Result};
use crate::config::PipelineConfig;
use crate::interval_filter::select_candidates;
use crate::resize::resize_if_needed;
use crate::scene::detect_scene_changes;
use crate::toolchain::{path_arg, Toolchain};

/// Extracts representative stills from a single video
#[derive(Debug, Clone)]
pub struct SceneFrameExtractor {
    toolchain: Toolchain,
    scene_threshold: f64,
    min_interval: f64,
    max_image_dimension: u32,
}

impl SceneFrameExtractor {
    pub fn new(toolchain: Toolchain, config: &PipelineConfig) -> Self {
        Self {
            toolchain,
            scene_threshold: config.scene_threshold,
            min_interval: config.min_interval,
            max_image_dimension: config.max_image_dimension,
        }
    }

    /// Extract frames from `video_path` into `output_dir`
    ///
    /// # Arguments
    /// * `video_path` - Chunk or whole video
    /// * `duration` - Length of this video in seconds
    /// * `output_dir` - Directory receiving the JPEG stills
    /// * `label_offset` - Chunk offset written into filenames so that files on
    ///   disk carry absolute timestamps
    ///
    /// # Returns
    /// * `Result<Vec<Frame>>` - Time-ordered frames with chunk-local timestamps
    ///
    /// # Errors
    /// Any failed scene detection, capture, or resize aborts the chunk.
    #[instrument(skip(self), fields(path = %video_path.display()))]
    pub fn extract(
        &self,
        video_path: &Path,
        duration: f64,
        output_dir: &Path,
        label_offset: f64,
    ) -> Result<Vec<Frame>> {
        fs::create_dir_all(output_dir)?;

        let raw = detect_scene_changes(&self.toolchain, video_path, self.scene_threshold, duration)?;
        let candidates = select_candidates(&raw, duration, self.min_interval);

        info!("Extracting {} frames from {} ({} scene changes)",
              candidates.len(), video_path.display(), raw.len());

        let mut frames = Vec::with_capacity(candidates.len());
        for (index, &timestamp) in candidates.iter().enumerate() {
            let path = output_dir.join(Frame::filename(index, timestamp + label_offset));
            self.capture_frame(video_path, timestamp, &path)?;
            frames.push(Frame::new(path, timestamp, index));
        }

        // Each resize touches only its own file
        let resized = frames
            .par_iter()
            .map(|frame| resize_if_needed(&frame.path, self.max_image_dimension))
            .collect::<Result<Vec<bool>>>()?;

        debug!("Resized {} of {} frames", resized.iter().filter(|r| **r).count(), frames.len());
        Ok(frames)
    }

    /// Seek to `timestamp` and write a single still to `output`
    #[instrument(skip(self, video_path, output))]
    pub fn capture_frame(&self, video_path: &Path, timestamp: f64, output: &Path) -> Result<()> {
        self.toolchain
            .ffmpeg()
            .arg("-ss")
            .arg(format!("{:.3}", timestamp))
            .arg("-i")
            .arg(path_arg(video_path))
            .args(["-frames:v", "1", "-q:v", "2"])
            .arg(path_arg(output))
            .expect_output(output)
            .run()?;
        Ok(())
    }
}
