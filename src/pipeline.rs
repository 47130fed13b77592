//! End-to-end key frame pipeline
//!
//! Prober → Segmenter → Chunk Coordinator (Scene Frame Extractor per chunk)
//! → Deduplicator → manifest. Either a complete, time-ordered, deduplicated
//! frame set is produced, or the run fails.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use crate::common::{Chunk, Frame, Result, VideoInfo};
use crate::config::PipelineConfig;
use crate::coordinator::{coordinate_chunks, frames_dir_for};
use crate::dedup::deduplicate_frames;
use crate::extractor::SceneFrameExtractor;
use crate::manifest::FrameManifest;
use crate::probe::probe_video;
use crate::segmenter::split_video;
use crate::toolchain::Toolchain;

/// Directory under the work dir that receives extracted frames
pub const FRAMES_DIR: &str = "frames";

/// The pipeline's output: surviving frames plus run statistics
#[derive(Debug, Clone)]
pub struct KeyframeSet {
    pub video: VideoInfo,
    pub frames_dir: PathBuf,
    pub frames: Vec<Frame>,
    pub chunk_count: usize,
    /// Frames captured before deduplication
    pub extracted: usize,
}

impl KeyframeSet {
    pub fn removed(&self) -> usize {
        self.extracted - self.frames.len()
    }
}

/// Seconds of video covered by `chunk`
pub fn chunk_span(total_duration: f64, chunk: &Chunk, chunk_duration: f64) -> f64 {
    (total_duration - chunk.time_offset).clamp(0.0, chunk_duration)
}

/// Runs every stage with one configuration
#[derive(Debug, Clone)]
pub struct KeyframePipeline {
    config: PipelineConfig,
    toolchain: Toolchain,
}

impl KeyframePipeline {
    /// # Errors
    /// * `InvalidConfig` - If any parameter is out of range
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let toolchain = Toolchain::from_config(&config);
        Ok(Self { config, toolchain })
    }

    /// Extract deduplicated key frames from `video_path` into `work_dir`
    ///
    /// # Errors
    /// * `MissingDependency` - If ffmpeg or ffprobe is unavailable
    /// * `VideoNotFound` / `InvalidVideo` - If the input cannot be probed
    /// * `SubprocessFailed` / `SubprocessTimeout` - If any toolchain call fails
    #[instrument(skip(self), fields(video = %video_path.display()))]
    pub fn run(&self, video_path: &Path, work_dir: &Path) -> Result<KeyframeSet> {
        self.toolchain.check_available()?;

        let video = probe_video(&self.toolchain, video_path)?;
        fs::create_dir_all(work_dir)?;

        let chunk_duration = self.config.chunk_duration;
        let chunks = split_video(&self.toolchain, &video, video_path, work_dir, chunk_duration)?;

        let frames_root = work_dir.join(FRAMES_DIR);
        let multi_chunk = chunks.len() > 1;
        let extractor = SceneFrameExtractor::new(self.toolchain.clone(), &self.config);

        let frames = coordinate_chunks(&chunks, self.config.max_workers, |chunk| {
            extractor.extract(
                &chunk.path,
                chunk_span(video.duration, chunk, chunk_duration),
                &frames_dir_for(chunk, &frames_root, multi_chunk),
                chunk.time_offset,
            )
        })?;
        let extracted = frames.len();

        let frames = deduplicate_frames(frames, self.config.similarity_threshold, self.config.hash_size)?;

        FrameManifest::new(video_path, &frames_root, &frames).write(&frames_root)?;

        info!("Kept {} of {} frames from {} chunks", frames.len(), extracted, chunks.len());

        Ok(KeyframeSet {
            video,
            frames_dir: frames_root,
            frames,
            chunk_count: chunks.len(),
            extracted,
        })
    }
}
