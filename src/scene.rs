//! Scene-change detection using ffmpeg's `scene` score
//!
//! ffmpeg's `select` filter passes only frames whose scene score exceeds the
//! threshold; `showinfo` logs each passing frame's presentation time on
//! stderr, which is parsed back into candidate timestamps.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info, instrument};
use crate::common::Result;
use crate::toolchain::{path_arg, Toolchain};

fn pts_time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"pts_time:\s*(-?[0-9]+(?:\.[0-9]+)?)").expect("pts_time pattern is valid")
    })
}

/// Filter graph selecting frames above `threshold` and logging their times
pub fn scene_filter(threshold: f64) -> String {
    format!("select='gt(scene,{})',showinfo", threshold)
}

/// Extract every `pts_time:<seconds>` value from ffmpeg showinfo output
///
/// Zero matches is not an error; the caller's fallback sampling covers it.
pub fn parse_scene_timestamps(stderr: &str) -> Vec<f64> {
    pts_time_pattern()
        .captures_iter(stderr)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .filter(|t| t.is_finite())
        .collect()
}

/// Run scene-change detection over one video
///
/// # Arguments
/// * `toolchain` - ffmpeg/ffprobe binaries and timeout
/// * `video_path` - Chunk or whole video to analyze
/// * `threshold` - Scene score (0.0-1.0); higher yields fewer, larger changes
/// * `duration` - Length of the video in seconds, used to size the deadline
///
/// # Returns
/// * `Result<Vec<f64>>` - Chunk-local timestamps, in the order ffmpeg reported them
#[instrument(skip(toolchain), fields(path = %video_path.display()))]
pub fn detect_scene_changes(
    toolchain: &Toolchain,
    video_path: &Path,
    threshold: f64,
    duration: f64,
) -> Result<Vec<f64>> {
    debug!("Running scene detection with threshold {}", threshold);

    let output = toolchain
        .ffmpeg()
        .arg("-i")
        .arg(path_arg(video_path))
        .arg("-vf")
        .arg(scene_filter(threshold))
        .args(["-an", "-f", "null", "-"])
        .timeout(toolchain.decode_timeout(duration))
        .run()?;

    let timestamps = parse_scene_timestamps(&output.stderr);
    info!("Detected {} scene changes in {}", timestamps.len(), video_path.display());
    Ok(timestamps)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOWINFO: &str = "\
[Parsed_showinfo_1 @ 0x7f8] config in time_base: 1/15360, frame_rate: 30/1
[Parsed_showinfo_1 @ 0x7f8] n:   0 pts: 691200 pts_time:45      duration:    512 fmt:yuv420p
[Parsed_showinfo_1 @ 0x7f8] n:   1 pts: 1152000 pts_time:75.0333 duration:    512 fmt:yuv420p
[Parsed_showinfo_1 @ 0x7f8] n:   2 pts: 1689600 pts_time:110.5 duration:    512 fmt:yuv420p
frame=    3 fps=0.0 q=-0.0 Lsize=N/A time=00:01:50.50 bitrate=N/A speed= 220x
";

    #[test]
    fn test_parse_scene_timestamps() {
        let timestamps = parse_scene_timestamps(SHOWINFO);
        assert_eq!(timestamps, vec![45.0, 75.0333, 110.5]);
    }

    #[test]
    fn test_parse_no_matches() {
        assert!(parse_scene_timestamps("").is_empty());
        assert!(parse_scene_timestamps("frame=0 fps=0.0 time=00:00:00.00").is_empty());
    }

    #[test]
    fn test_scene_filter() {
        assert_eq!(scene_filter(0.3), "select='gt(scene,0.3)',showinfo");
    }
}
