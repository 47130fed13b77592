//! Candidate timestamp filtering for the scene frame extractor
//!
//! Scene detection produces raw cut points. This module enforces a minimum
//! spacing between kept candidates, supplements sparse results with uniform
//! samples so static recordings are still covered, and guarantees an early
//! frame near the start of every chunk.

use tracing::{debug, instrument, trace};

/// Timestamp of the synthetic frame added near the start of a chunk
pub const EARLY_FRAME_TIME: f64 = 0.5;

/// Candidates later than this get a synthetic early frame prepended
const EARLY_FRAME_CUTOFF: f64 = 1.0;

/// Expect at least one candidate per this many seconds
const SECONDS_PER_EXPECTED_FRAME: f64 = 30.0;

const MIN_EXPECTED_FRAMES: usize = 3;

/// Upper bound on fallback samples for one video
const MAX_UNIFORM_SAMPLES: usize = 10_000;

/// Greedy left-to-right spacing filter
///
/// A candidate is kept only if it is at least `min_interval` seconds after
/// the last kept candidate, so ties are resolved in favour of the earliest.
#[derive(Debug, Clone)]
pub struct IntervalFilter {
    min_interval: f64,
    last_kept: Option<f64>,
}

impl IntervalFilter {
    /// # Panics
    /// Panics if `min_interval` is not positive
    pub fn new(min_interval: f64) -> Self {
        assert!(min_interval > 0.0, "Minimum interval must be positive, got: {}", min_interval);
        Self {
            min_interval,
            last_kept: None,
        }
    }

    /// Offer the next candidate in ascending order; returns whether it is kept
    pub fn accept(&mut self, timestamp: f64) -> bool {
        if let Some(last) = self.last_kept {
            let since_last = timestamp - last;
            if since_last < self.min_interval {
                trace!("Suppressing candidate at {:.2}s ({:.2}s since {:.2}s)",
                       timestamp, since_last, last);
                return false;
            }
        }
        self.last_kept = Some(timestamp);
        true
    }

    pub fn last_kept(&self) -> Option<f64> {
        self.last_kept
    }
}

/// Sort candidates and keep those spaced at least `min_interval` apart
pub fn enforce_min_interval(candidates: &[f64], min_interval: f64) -> Vec<f64> {
    let mut sorted: Vec<f64> = candidates
        .iter()
        .copied()
        .filter(|t| t.is_finite() && *t >= 0.0)
        .collect();
    sorted.sort_by(f64::total_cmp);

    let mut filter = IntervalFilter::new(min_interval);
    sorted.into_iter().filter(|t| filter.accept(*t)).collect()
}

/// Minimum candidate count below which uniform sampling kicks in
pub fn minimum_expected(duration: f64) -> usize {
    let by_duration = if duration.is_finite() && duration > 0.0 {
        (duration / SECONDS_PER_EXPECTED_FRAME).floor() as usize
    } else {
        0
    };
    by_duration.max(MIN_EXPECTED_FRAMES)
}

/// Evenly spaced timestamps at `min(min_interval, duration / min_expected)`
///
/// Spacing is widened when needed so no more than `MAX_UNIFORM_SAMPLES`
/// timestamps are produced.
pub fn uniform_samples(duration: f64, min_interval: f64, min_expected: usize) -> Vec<f64> {
    if !(duration > 0.0) || min_expected == 0 {
        return Vec::new();
    }

    let spacing = min_interval.min(duration / min_expected as f64);
    if !(spacing > 0.0) {
        return Vec::new();
    }

    let spacing = spacing.max(duration / MAX_UNIFORM_SAMPLES as f64);
    let steps = (duration / spacing).ceil() as usize;

    (1..steps)
        .map(|k| k as f64 * spacing)
        .take_while(|t| *t < duration)
        .collect()
}

/// Add samples that are not within `min_interval / 2` of an existing candidate
pub fn merge_samples(existing: &[f64], samples: &[f64], min_interval: f64) -> Vec<f64> {
    let tolerance = min_interval * 0.5;
    let mut merged = existing.to_vec();
    for &sample in samples {
        if existing.iter().all(|t| (t - sample).abs() >= tolerance) {
            merged.push(sample);
        }
    }
    merged.sort_by(f64::total_cmp);
    merged
}

/// Make sure the candidate list is non-empty and starts near the beginning
pub fn ensure_early_frame(candidates: &mut Vec<f64>, duration: f64) {
    // Very short clips cannot seek to 0.5s
    let early = if duration > 0.0 && duration < 2.0 * EARLY_FRAME_TIME {
        duration / 2.0
    } else {
        EARLY_FRAME_TIME
    };

    match candidates.first() {
        None => candidates.push(early),
        Some(&first) if first > EARLY_FRAME_CUTOFF => candidates.insert(0, early),
        Some(_) => {}
    }
}

/// Turn raw scene-change timestamps into the final per-chunk candidate list
///
/// Applies interval enforcement, sparse-video fallback sampling, and the
/// early-frame guarantee. The result is sorted and never empty. Consecutive
/// candidates are at least `min_interval` apart, except for a prepended
/// synthetic early frame.
#[instrument(skip(raw), fields(raw_count = raw.len()))]
pub fn select_candidates(raw: &[f64], duration: f64, min_interval: f64) -> Vec<f64> {
    let mut candidates = enforce_min_interval(raw, min_interval);
    let filtered = candidates.len();
    debug!("{} of {} scene candidates survive the {:.1}s interval filter",
           candidates.len(), raw.len(), min_interval);

    let min_expected = minimum_expected(duration);
    if candidates.len() < min_expected {
        let samples = uniform_samples(duration, min_interval, min_expected);
        let merged = merge_samples(&candidates, &samples, min_interval);
        candidates = enforce_min_interval(&merged, min_interval);
        debug!("Sparse video ({} < {} expected), sampled up to {} candidates",
               filtered, min_expected, candidates.len());
    }

    ensure_early_frame(&mut candidates, duration);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_spaced(candidates: &[f64], min_interval: f64) {
        for pair in candidates.windows(2) {
            assert!(pair[1] - pair[0] >= min_interval,
                    "{} and {} closer than {}", pair[0], pair[1], min_interval);
        }
    }

    #[test]
    fn test_interval_filter_basic() {
        let mut filter = IntervalFilter::new(5.0);
        assert!(filter.accept(10.0));
        assert!(!filter.accept(12.0));
        assert!(filter.accept(15.0));
        assert_eq!(filter.last_kept(), Some(15.0));
        assert!(!filter.accept(19.9));
        assert_eq!(filter.last_kept(), Some(15.0));
    }

    #[test]
    #[should_panic(expected = "Minimum interval must be positive")]
    fn test_interval_filter_zero_interval() {
        IntervalFilter::new(0.0);
    }

    #[test]
    fn test_enforce_min_interval_keeps_earliest() {
        let kept = enforce_min_interval(&[12.0, 3.0, 4.0, 7.9, 8.0, 30.0], 5.0);
        assert_eq!(kept, vec![3.0, 8.0, 30.0]);
        assert_spaced(&kept, 5.0);
    }

    #[test]
    fn test_enforce_min_interval_drops_invalid() {
        let kept = enforce_min_interval(&[f64::NAN, -1.0, 2.0], 5.0);
        assert_eq!(kept, vec![2.0]);
    }

    #[test]
    fn test_minimum_expected() {
        assert_eq!(minimum_expected(0.0), 3);
        assert_eq!(minimum_expected(60.0), 3);
        assert_eq!(minimum_expected(120.0), 4);
        assert_eq!(minimum_expected(600.0), 20);
    }

    #[test]
    fn test_uniform_samples_spacing() {
        // 600s / 20 expected = 30s, capped by min_interval
        let samples = uniform_samples(600.0, 5.0, 20);
        assert_eq!(samples.first(), Some(&5.0));
        assert!(samples.iter().all(|t| *t < 600.0));
        assert_eq!(samples.len(), 119);

        // Short clip: 6s / 3 = 2s spacing
        assert_eq!(uniform_samples(6.0, 5.0, 3), vec![2.0, 4.0]);
        assert!(uniform_samples(0.0, 5.0, 3).is_empty());
    }

    #[test]
    fn test_uniform_samples_bounded_for_tiny_interval() {
        let samples = uniform_samples(600.0, 1e-9, 20);
        assert!(samples.len() <= MAX_UNIFORM_SAMPLES);
        assert!(samples.len() > MAX_UNIFORM_SAMPLES / 2);
        assert!(samples.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(samples.iter().all(|t| *t > 0.0 && *t < 600.0));

        assert!(uniform_samples(f64::INFINITY, 5.0, 3).len() <= MAX_UNIFORM_SAMPLES);
    }

    #[test]
    fn test_merge_samples_skips_near_existing() {
        let merged = merge_samples(&[10.0], &[5.0, 8.0, 12.4, 15.0], 5.0);
        assert_eq!(merged, vec![5.0, 10.0, 15.0]);
    }

    #[test]
    fn test_ensure_early_frame() {
        let mut empty = Vec::new();
        ensure_early_frame(&mut empty, 60.0);
        assert_eq!(empty, vec![0.5]);

        let mut late = vec![12.0];
        ensure_early_frame(&mut late, 60.0);
        assert_eq!(late, vec![0.5, 12.0]);

        let mut early = vec![0.8, 12.0];
        ensure_early_frame(&mut early, 60.0);
        assert_eq!(early, vec![0.8, 12.0]);

        let mut tiny = Vec::new();
        ensure_early_frame(&mut tiny, 0.4);
        assert_eq!(tiny, vec![0.2]);
    }

    #[test]
    fn test_select_candidates_dense_scene_changes() {
        // 90s video expects 3, detection already yields enough
        let raw = [0.2, 10.0, 11.0, 25.0, 40.0, 41.0, 80.0];
        let selected = select_candidates(&raw, 90.0, 5.0);
        assert_eq!(selected, vec![0.2, 10.0, 25.0, 40.0, 80.0]);
    }

    #[test]
    fn test_select_candidates_static_video_fallback() {
        // No scene changes at all in a 5 minute static recording
        let selected = select_candidates(&[], 300.0, 5.0);
        assert!(selected.len() >= minimum_expected(300.0));
        assert_eq!(selected[0], 0.5);
        assert_spaced(&selected[1..], 5.0);
        assert!(selected.iter().all(|t| *t < 300.0));
    }

    #[test]
    fn test_select_candidates_merges_with_detected() {
        let selected = select_candidates(&[7.0], 30.0, 5.0);
        assert!(selected.contains(&7.0));
        assert_spaced(&selected[1..], 5.0);
        assert!(selected.len() >= 3);
    }

    #[test]
    fn test_select_candidates_never_empty() {
        for duration in [0.0, 0.3, 1.0, 4.0, 29.0, 3600.0] {
            let selected = select_candidates(&[], duration, 5.0);
            assert!(!selected.is_empty(), "empty for duration {}", duration);
        }
    }
}
