//! Perceptual-hash deduplication of the merged frame sequence
//!
//! Each frame is reduced to an average hash. Walking the frames in timestamp
//! order, a frame is kept only if it differs enough from the last *kept*
//! frame; the comparison is a pure fold that yields a plan, and deleting the
//! discarded files is a separate side-effecting pass.
//!
//! The anchor comparison is order dependent: a slow drift where no single
//! step crosses the threshold relative to the anchor is collapsed. Run it
//! only on the complete, timestamp-sorted list.

use image::DynamicImage;
use img_hash::{HashAlg, HasherConfig, ImageHash};
use rayon::prelude::*;
use std::fs;
use std::io::ErrorKind;
use tracing::{debug, info, instrument, trace, warn};
use crate::common::{Frame, KeyframeError, Result};

/// Mean (average) hash of a frame, `hash_size²` bits
pub type PerceptualHash = ImageHash;

fn mean_hasher(hash_size: u32) -> img_hash::Hasher {
    HasherConfig::new()
        .hash_alg(HashAlg::Mean)
        .hash_size(hash_size, hash_size)
        .to_hasher()
}

/// Number of bits carried by `hash`
pub fn hash_bits(hash: &PerceptualHash) -> u32 {
    (hash.as_bytes().len() * 8) as u32
}

/// Grayscale, shrink to `hash_size`×`hash_size`, and threshold at the mean
///
/// img_hash is built on image 0.23, so the decoded luma plane is handed over
/// as a raw buffer.
pub fn average_hash(image: &DynamicImage, hash_size: u32) -> Result<PerceptualHash> {
    let luma = image.to_luma8();
    let (width, height) = luma.dimensions();

    let buffer = img_hash::image::GrayImage::from_raw(width, height, luma.into_raw())
        .ok_or_else(|| KeyframeError::internal_error("luma buffer does not match its dimensions"))?;

    Ok(mean_hasher(hash_size).hash_image(&img_hash::image::DynamicImage::ImageLuma8(buffer)))
}

/// Decode the frame's file and hash it
pub fn hash_frame(frame: &Frame, hash_size: u32) -> Result<PerceptualHash> {
    let img = image::open(&frame.path).map_err(|e| KeyframeError::image_error(&frame.path, e))?;
    average_hash(&img, hash_size)
}

/// Indices to keep and to discard, both ascending
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupPlan {
    pub keep: Vec<usize>,
    pub discard: Vec<usize>,
}

/// Largest count of identical bits that still counts as "different enough"
pub fn max_same_bits(total_bits: u32, similarity_threshold: f64) -> u32 {
    (total_bits as f64 * similarity_threshold).floor() as u32
}

/// Decide which frames survive, anchored to the last kept hash
///
/// The first frame is always kept. A later frame is kept when its count of
/// bits identical to the anchor is at most `max_same_bits`, and then becomes
/// the new anchor.
pub fn plan_deduplication(hashes: &[PerceptualHash], similarity_threshold: f64) -> DedupPlan {
    let Some(first) = hashes.first() else {
        return DedupPlan::default();
    };

    let total_bits = hash_bits(first);
    let limit = max_same_bits(total_bits, similarity_threshold);

    let (plan, _) = hashes.iter().enumerate().skip(1).fold(
        (DedupPlan { keep: vec![0], discard: Vec::new() }, first),
        |(mut plan, anchor), (index, hash)| {
            let same_bits = total_bits - anchor.dist(hash);
            if same_bits <= limit {
                trace!("Frame {} keeps ({} same bits <= {})", index, same_bits, limit);
                plan.keep.push(index);
                (plan, hash)
            } else {
                trace!("Frame {} is a near-duplicate ({} same bits > {})", index, same_bits, limit);
                plan.discard.push(index);
                (plan, anchor)
            }
        },
    );
    plan
}

/// Remove near-duplicate frames and delete their files
///
/// # Arguments
/// * `frames` - Complete list, ascending by timestamp
/// * `similarity_threshold` - Fraction of identical bits (0.0-1.0)
/// * `hash_size` - Side length of the hash grid
///
/// # Returns
/// * `Result<Vec<Frame>>` - Surviving frames, still in timestamp order
#[instrument(skip(frames), fields(frames = frames.len()))]
pub fn deduplicate_frames(frames: Vec<Frame>, similarity_threshold: f64, hash_size: u32) -> Result<Vec<Frame>> {
    if frames.is_empty() {
        return Ok(frames);
    }

    // Hashing is independent per frame; the fold below stays sequential
    let hashes = frames
        .par_iter()
        .map(|frame| hash_frame(frame, hash_size))
        .collect::<Result<Vec<_>>>()?;

    let plan = plan_deduplication(&hashes, similarity_threshold);

    let mut slots: Vec<Option<Frame>> = frames.into_iter().map(Some).collect();
    let discarded: Vec<Frame> = plan.discard.iter().filter_map(|&i| slots[i].take()).collect();
    let kept: Vec<Frame> = slots.into_iter().flatten().collect();

    delete_frame_files(&discarded)?;

    info!("Deduplication kept {} frames, removed {}", kept.len(), discarded.len());
    Ok(kept)
}

/// Delete backing files of discarded frames; already-missing files are fine
pub fn delete_frame_files(frames: &[Frame]) -> Result<()> {
    for frame in frames {
        match fs::remove_file(&frame.path) {
            Ok(()) => debug!("Deleted duplicate {}", frame.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Duplicate {} was already gone", frame.path.display());
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
