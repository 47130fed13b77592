//! Chunk Coordinator
//!
//! Runs frame extraction for every chunk on a bounded worker pool, maps
//! chunk-local timestamps back onto the original video, and establishes the
//! single cross-chunk ordering the rest of the pipeline relies on.

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use crate::common::{Chunk, Frame, KeyframeError, Result};

/// Where a chunk's frames are written
///
/// Per-chunk subdirectories exist only when the video was actually split.
pub fn frames_dir_for(chunk: &Chunk, frames_root: &Path, multi_chunk: bool) -> PathBuf {
    if multi_chunk {
        frames_root.join(chunk.name())
    } else {
        frames_root.to_path_buf()
    }
}

/// Shift each chunk's frames by its offset and sort the union by timestamp
///
/// The sort is stable and breaks timestamp ties by chunk index, so
/// completion order of the workers never leaks into the result.
pub fn merge_chunk_frames(per_chunk: Vec<(Chunk, Vec<Frame>)>) -> Vec<Frame> {
    let mut merged: Vec<(usize, Frame)> = per_chunk
        .into_iter()
        .flat_map(|(chunk, frames)| {
            let offset = chunk.time_offset;
            let index = chunk.index;
            frames.into_iter().map(move |frame| (index, frame.offset_by(offset)))
        })
        .collect();

    merged.sort_by(|(a_chunk, a), (b_chunk, b)| {
        a.timestamp.total_cmp(&b.timestamp).then(a_chunk.cmp(b_chunk))
    });
    merged.into_iter().map(|(_, frame)| frame).collect()
}

/// Run `extract` on every chunk with at most `max_workers` in flight
///
/// # Arguments
/// * `chunks` - Chunks from the segmenter, in index order
/// * `max_workers` - Size of the worker pool
/// * `extract` - Per-chunk extraction returning chunk-local frames
///
/// # Returns
/// * `Result<Vec<Frame>>` - All frames with absolute timestamps, ascending
///
/// # Errors
/// The first failing chunk fails the whole run; partial results are dropped.
#[instrument(skip(chunks, extract), fields(chunks = chunks.len()))]
pub fn coordinate_chunks<F>(chunks: &[Chunk], max_workers: usize, extract: F) -> Result<Vec<Frame>>
where
    F: Fn(&Chunk) -> Result<Vec<Frame>> + Sync,
{
    let workers = max_workers.clamp(1, chunks.len().max(1));
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("chunk-worker-{}", i))
        .build()
        .map_err(|e| KeyframeError::internal_error(format!("failed to build worker pool: {}", e)))?;

    info!("Extracting frames from {} chunks with {} workers", chunks.len(), workers);

    let per_chunk: Vec<(Chunk, Vec<Frame>)> = pool.install(|| {
        chunks
            .par_iter()
            .map(|chunk| {
                let frames = extract(chunk)?;
                debug!("Chunk {} produced {} frames", chunk.index, frames.len());
                Ok((chunk.clone(), frames))
            })
            .collect::<Result<Vec<_>>>()
    })?;

    let merged = merge_chunk_frames(per_chunk);
    info!("Merged {} frames across {} chunks", merged.len(), chunks.len());
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn two_chunks() -> Vec<Chunk> {
        vec![
            Chunk::new("chunks/chunk_000.mp4", 0, 600.0),
            Chunk::new("chunks/chunk_001.mp4", 1, 600.0),
        ]
    }

    #[test]
    fn test_local_timestamp_maps_to_absolute() {
        let chunks = two_chunks();
        let frames = coordinate_chunks(&chunks, 2, |chunk| {
            Ok(vec![Frame::new(format!("{}/frame_0000.jpg", chunk.name()), 45.0, 0)])
        })
        .unwrap();

        let timestamps: Vec<f64> = frames.iter().map(|f| f.timestamp).collect();
        assert_eq!(timestamps, vec![45.0, 645.0]);
    }

    #[test]
    fn test_completion_order_does_not_leak() {
        let chunks: Vec<Chunk> = (0..6).map(|i| Chunk::new(format!("chunk_{:03}.mp4", i), i, 100.0)).collect();

        // Earlier chunks finish last
        let frames = coordinate_chunks(&chunks, 4, |chunk| {
            thread::sleep(Duration::from_millis(10 * (6 - chunk.index as u64)));
            Ok(vec![
                Frame::new("a.jpg", 0.5, 0),
                Frame::new("b.jpg", 50.0, 1),
            ])
        })
        .unwrap();

        assert_eq!(frames.len(), 12);
        assert!(frames.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(frames[0].timestamp, 0.5);
        assert_eq!(frames[11].timestamp, 550.0);
    }

    #[test]
    fn test_pool_is_bounded() {
        let chunks: Vec<Chunk> = (0..8).map(|i| Chunk::new("c.mp4", i, 10.0)).collect();
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        coordinate_chunks(&chunks, 2, |_| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        })
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_chunk_failure_is_fatal() {
        let chunks = two_chunks();
        let result = coordinate_chunks(&chunks, 2, |chunk| {
            if chunk.index == 1 {
                Err(KeyframeError::SubprocessFailed {
                    program: "ffmpeg".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "corrupt segment".to_string(),
                })
            } else {
                Ok(vec![Frame::new("a.jpg", 1.0, 0)])
            }
        });
        assert!(matches!(result, Err(KeyframeError::SubprocessFailed { .. })));
    }

    #[test]
    fn test_identical_timestamps_from_different_chunks_are_kept() {
        let merged = merge_chunk_frames(vec![
            (Chunk::new("chunk_001.mp4", 1, 600.0), vec![Frame::new("b.jpg", 0.0, 0)]),
            (Chunk::new("chunk_000.mp4", 0, 600.0), vec![Frame::new("a.jpg", 600.0, 7)]),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].path, PathBuf::from("a.jpg"));
        assert_eq!(merged[1].path, PathBuf::from("b.jpg"));
    }

    #[test]
    fn test_frames_dir_layout() {
        let chunk = Chunk::new("work/chunks/chunk_002.mp4", 2, 600.0);
        assert_eq!(frames_dir_for(&chunk, Path::new("work/frames"), true), PathBuf::from("work/frames/chunk_002"));
        assert_eq!(frames_dir_for(&chunk, Path::new("work/frames"), false), PathBuf::from("work/frames"));
    }
}
