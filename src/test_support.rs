//! Fake ffmpeg/ffprobe scripts for exercising the pipeline without a real toolchain

use image::{Rgb, RgbImage};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
#[cfg(unix)]
use crate::toolchain::Toolchain;

#[cfg(unix)]
/// What the fake toolchain reports about its input
pub struct FakeVideo {
    pub duration: f64,
    pub scene_times: Vec<f64>,
    pub width: u32,
    pub height: u32,
}

/// Write a JPEG with a horizontal gradient, or its mirror image
pub fn write_test_jpeg(path: &Path, width: u32, height: u32, mirrored: bool) {
    let img = RgbImage::from_fn(width, height, |x, _| {
        let level = (x * 255 / width.max(1)) as u8;
        let level = if mirrored { 255 - level } else { level };
        Rgb([level, level, level])
    });
    img.save(path).unwrap();
}

#[cfg(unix)]
fn write_script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{}", body)).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(unix)]
/// Install fake binaries under `dir` and return a toolchain that uses them
///
/// Scene detection prints showinfo lines for `scene_times`, frame capture
/// copies a fixture JPEG, and segmentation writes an empty chunk file.
pub fn fake_toolchain(dir: &Path, video: &FakeVideo) -> Toolchain {
    let bin = dir.join("fake-bin");
    fs::create_dir_all(&bin).unwrap();

    let fixture = bin.join("fixture.jpg");
    write_test_jpeg(&fixture, video.width, video.height, false);

    let showinfo: String = video
        .scene_times
        .iter()
        .enumerate()
        .map(|(n, t)| format!("echo '[Parsed_showinfo_1 @ 0x1] n: {} pts: {} pts_time:{} duration: 1' >&2\n", n, n, t))
        .collect();

    let ffmpeg = bin.join("ffmpeg");
    write_script(&ffmpeg, &format!(
        "for last; do :; done\n\
         case \"$*\" in\n\
         *-version*) echo 'ffmpeg version fake' ;;\n\
         *showinfo*)\n{}\
         ;;\n\
         *frames:v*) cp '{}' \"$last\" ;;\n\
         *'-c copy'*) : > \"$last\" ;;\n\
         *) exit 1 ;;\n\
         esac\n",
        showinfo,
        fixture.display(),
    ));

    let ffprobe = bin.join("ffprobe");
    write_script(&ffprobe, &format!(
        "case \"$*\" in\n\
         *-version*) echo 'ffprobe version fake' ;;\n\
         *) echo '{{\"streams\": [{{\"codec_type\": \"video\", \"codec_name\": \"h264\", \
         \"width\": {}, \"height\": {}, \"r_frame_rate\": \"30/1\"}}], \
         \"format\": {{\"duration\": \"{}\"}}}}' ;;\n\
         esac\n",
        video.width, video.height, video.duration,
    ));

    Toolchain::new(
        ffmpeg.display().to_string(),
        ffprobe.display().to_string(),
        Some(std::time::Duration::from_secs(30)),
    )
}
