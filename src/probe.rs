//! Video metadata probing via ffprobe

use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, instrument};
use crate::common::{KeyframeError, Result, VideoInfo};
use crate::toolchain::{path_arg, Toolchain};

/// Used when the container reports an unusable frame rate
const DEFAULT_FPS: f64 = 30.0;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Probe a video file for duration, resolution, frame rate and codec
///
/// # Errors
/// * `VideoNotFound` - If the path does not exist
/// * `SubprocessFailed` - If ffprobe cannot read the file
/// * `InvalidVideo` - If the output has no usable video stream
#[instrument(skip(toolchain), fields(path = %path.display()))]
pub fn probe_video(toolchain: &Toolchain, path: &Path) -> Result<VideoInfo> {
    if !path.is_file() {
        return Err(KeyframeError::VideoNotFound {
            path: path.display().to_string(),
        });
    }

    let output = toolchain
        .ffprobe()
        .args(["-print_format", "json", "-show_format", "-show_streams"])
        .arg(path_arg(path))
        .run()?;

    let info = parse_probe_output(path, &output.stdout)?;
    info!("Probed {}: {}", path.display(), info.description());
    Ok(info)
}

/// Decode ffprobe's JSON report into [`VideoInfo`]
pub fn parse_probe_output(path: &Path, json: &str) -> Result<VideoInfo> {
    let probe: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| KeyframeError::invalid_video(path, format!("unreadable ffprobe output: {}", e)))?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| KeyframeError::invalid_video(path, "no video stream"))?;

    let width = stream.width.filter(|w| *w > 0)
        .ok_or_else(|| KeyframeError::invalid_video(path, "missing width"))?;
    let height = stream.height.filter(|h| *h > 0)
        .ok_or_else(|| KeyframeError::invalid_video(path, "missing height"))?;

    let rate = stream
        .r_frame_rate
        .as_deref()
        .or(stream.avg_frame_rate.as_deref())
        .unwrap_or("");
    let fps = parse_frame_rate(rate);

    let format_duration = probe.format.as_ref().and_then(|f| f.duration.as_deref());
    let duration = [format_duration, stream.duration.as_deref()]
        .into_iter()
        .flatten()
        .find_map(parse_duration)
        .ok_or_else(|| KeyframeError::invalid_video(path, "no usable duration"))?;

    Ok(VideoInfo {
        duration,
        width,
        height,
        fps,
        codec: stream.codec_name.clone().unwrap_or_else(|| "unknown".to_string()),
    })
}

/// ffprobe reports `"N/A"` for containers that do not record a duration
fn parse_duration(raw: &str) -> Option<f64> {
    match raw.trim().parse::<f64>() {
        Ok(d) if d.is_finite() && d >= 0.0 => Some(d),
        _ => {
            debug!("Ignoring unusable duration {:?}", raw);
            None
        }
    }
}

/// Parse a rational frame rate such as `"30000/1001"`
///
/// A zero denominator or unparsable value degrades to 30 fps.
pub fn parse_frame_rate(rate: &str) -> f64 {
    let fps = match rate.trim().split_once('/') {
        Some((num, den)) => match (num.trim().parse::<f64>(), den.trim().parse::<f64>()) {
            (Ok(num), Ok(den)) if den != 0.0 => num / den,
            _ => DEFAULT_FPS,
        },
        None => rate.trim().parse::<f64>().unwrap_or(DEFAULT_FPS),
    };

    if fps.is_finite() && fps > 0.0 {
        fps
    } else {
        debug!("Unusable frame rate {:?}, defaulting to {}", rate, DEFAULT_FPS);
        DEFAULT_FPS
    }
}
