//! Frame manifest and directory loader
//!
//! After deduplication the pipeline writes `manifest.json` next to the frames.
//! The manifest is the source of truth when reloading a frames directory;
//! filenames (`frame_NNNN_<seconds>s.jpg`) are a human-readable label and a
//! fallback for directories written without one.

use glob::{glob, Pattern};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, instrument, warn};
use crate::common::{Frame, KeyframeError, Result};

pub const MANIFEST_FILE: &str = "manifest.json";

const MANIFEST_VERSION: u32 = 1;

fn filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^frame_(\d+)_(\d+(?:\.\d+)?)s\.jpg$").expect("frame filename pattern is valid")
    })
}

/// One surviving frame, path relative to the frames directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file: PathBuf,
    pub timestamp: f64,
    pub index: usize,
}

/// Sidecar record of a frames directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameManifest {
    pub version: u32,
    pub source: PathBuf,
    pub frames: Vec<ManifestEntry>,
}

impl FrameManifest {
    /// Build a manifest for `frames` stored under `frames_dir`
    pub fn new(source: &Path, frames_dir: &Path, frames: &[Frame]) -> Self {
        let frames = frames
            .iter()
            .map(|frame| ManifestEntry {
                file: frame
                    .path
                    .strip_prefix(frames_dir)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| frame.path.clone()),
                timestamp: frame.timestamp,
                index: frame.index,
            })
            .collect();

        Self {
            version: MANIFEST_VERSION,
            source: source.to_path_buf(),
            frames,
        }
    }

    /// Write as pretty JSON to `frames_dir/manifest.json`
    #[instrument(skip(self), fields(frames = self.frames.len()))]
    pub fn write(&self, frames_dir: &Path) -> Result<PathBuf> {
        let path = frames_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        debug!("Wrote manifest {}", path.display());
        Ok(path)
    }

    pub fn read(frames_dir: &Path) -> Result<Self> {
        let json = fs::read_to_string(frames_dir.join(MANIFEST_FILE))?;
        let manifest: Self = serde_json::from_str(&json)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(KeyframeError::internal_error(format!(
                "unsupported manifest version {}", manifest.version
            )));
        }
        Ok(manifest)
    }

    /// Frames whose files still exist, resolved against `frames_dir`
    pub fn into_frames(self, frames_dir: &Path) -> Vec<Frame> {
        self.frames
            .into_iter()
            .filter_map(|entry| {
                let path = frames_dir.join(&entry.file);
                if path.is_file() {
                    Some(Frame::new(path, entry.timestamp, entry.index))
                } else {
                    warn!("Manifest entry {} has no file, skipping", path.display());
                    None
                }
            })
            .collect()
    }
}

/// Parse `(index, timestamp)` out of a frame filename
pub fn parse_frame_filename(name: &str) -> Option<(usize, f64)> {
    let caps = filename_pattern().captures(name)?;
    let index = caps.get(1)?.as_str().parse().ok()?;
    let timestamp = caps.get(2)?.as_str().parse().ok()?;
    Some((index, timestamp))
}

/// Reconstruct the frame list of a previously populated directory
///
/// Uses the manifest when present, otherwise scans `**/frame_*.jpg` and
/// parses timestamps from the filenames. Files whose names do not parse are
/// skipped. The result is sorted by timestamp.
#[instrument(fields(dir = %dir.display()))]
pub fn load_frames_from_directory(dir: &Path) -> Result<Vec<Frame>> {
    if !dir.is_dir() {
        return Err(KeyframeError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("frames directory not found: {}", dir.display()),
        )));
    }

    let mut frames = if dir.join(MANIFEST_FILE).is_file() {
        debug!("Loading frames from manifest");
        FrameManifest::read(dir)?.into_frames(dir)
    } else {
        scan_frame_files(dir)?
    };

    frames.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    info!("Loaded {} frames from {}", frames.len(), dir.display());
    Ok(frames)
}

fn scan_frame_files(dir: &Path) -> Result<Vec<Frame>> {
    // Brackets or wildcards in the directory name must match literally
    let root = Pattern::escape(&dir.to_string_lossy());
    let pattern = Path::new(&root).join("**").join("frame_*.jpg");
    let pattern = pattern.to_string_lossy();
    let paths = glob(&pattern)
        .map_err(|e| KeyframeError::internal_error(format!("bad glob pattern {}: {}", pattern, e)))?;

    let mut frames = Vec::new();
    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        match parse_frame_filename(&name) {
            Some((index, timestamp)) => frames.push(Frame::new(path, timestamp, index)),
            None => warn!("Cannot parse timestamp from {}, skipping", path.display()),
        }
    }
    Ok(frames)
}
