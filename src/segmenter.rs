//! Chunked segmentation of long videos
//!
//! Videos longer than the configured chunk duration are split into
//! fixed-length, stream-copied chunks under `work_dir/chunks/`. Stream copy
//! cuts on keyframes, so real chunk boundaries may drift from the requested
//! ones by up to one keyframe interval.

use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};
use crate::common::{Chunk, KeyframeError, Result, VideoInfo};
use crate::toolchain::{path_arg, Toolchain};

/// Directory under the work dir that receives chunk files
pub const CHUNKS_DIR: &str = "chunks";

/// Number of chunks needed to cover `duration`
pub fn plan_chunk_count(duration: f64, chunk_duration: f64) -> usize {
    if duration <= chunk_duration {
        1
    } else {
        (duration / chunk_duration).ceil() as usize
    }
}

/// Filename of the chunk at `index`
pub fn chunk_filename(index: usize) -> String {
    format!("chunk_{:03}.mp4", index)
}

/// Split a video into chunks of at most `chunk_duration` seconds
///
/// Returns a single chunk referencing the original file when no split is
/// needed. Any failed chunk aborts the run, since chunk offsets assume a
/// complete, gapless sequence.
#[instrument(skip(toolchain, info), fields(path = %video_path.display()))]
pub fn split_video(
    toolchain: &Toolchain,
    info: &VideoInfo,
    video_path: &Path,
    work_dir: &Path,
    chunk_duration: f64,
) -> Result<Vec<Chunk>> {
    if !(chunk_duration > 0.0) {
        return Err(KeyframeError::config_error(format!(
            "chunk_duration must be positive, got {}", chunk_duration
        )));
    }

    let num_chunks = plan_chunk_count(info.duration, chunk_duration);
    if num_chunks == 1 {
        debug!("{:.1}s fits in one chunk, no split", info.duration);
        return Ok(vec![Chunk::whole(video_path)]);
    }

    let chunks_dir = work_dir.join(CHUNKS_DIR);
    fs::create_dir_all(&chunks_dir)?;

    info!("Splitting {:.1}s video into {} chunks of {}s", info.duration, num_chunks, chunk_duration);

    let mut chunks = Vec::with_capacity(num_chunks);
    for index in 0..num_chunks {
        let chunk = Chunk::new(chunks_dir.join(chunk_filename(index)), index, chunk_duration);

        toolchain
            .ffmpeg()
            .arg("-ss")
            .arg(format!("{:.3}", chunk.time_offset))
            .arg("-i")
            .arg(path_arg(video_path))
            .arg("-t")
            .arg(format!("{:.3}", chunk_duration))
            .args(["-c", "copy", "-avoid_negative_ts", "make_zero"])
            .arg(path_arg(&chunk.path))
            .expect_output(&chunk.path)
            .run()?;

        debug!("Wrote chunk {} at offset {:.1}s", chunk.path.display(), chunk.time_offset);
        chunks.push(chunk);
    }

    Ok(chunks)
}
