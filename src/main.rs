//! Command-line interface for the key frame extraction library
//!
//! Extracts deduplicated key frames from a screen recording, shows probed
//! video information, or lists a previously extracted frame directory.

use anyhow::{bail, Context};
use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use keyframe_extract::{
    init_tracing, load_frames_from_directory, probe_video, Frame, KeyframePipeline,
    PipelineConfig, Toolchain,
};

/// Command-line arguments structure
#[derive(Debug)]
struct Args {
    video_path: Option<PathBuf>,
    work_dir: PathBuf,
    load_dir: Option<PathBuf>,
    config: PipelineConfig,
    verbose: bool,
    show_video_info: bool,
    output_format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum OutputFormat {
    Simple,     // One frame path per line
    Detailed,   // Timestamps and run statistics
    Json,       // JSON format for integration
}

impl Default for Args {
    fn default() -> Self {
        Self {
            video_path: None,
            work_dir: PathBuf::from("work"),
            load_dir: None,
            config: PipelineConfig::default(),
            verbose: false,
            show_video_info: false,
            output_format: OutputFormat::Simple,
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let raw: Vec<String> = env::args().collect();
    let args = parse_args(&raw)?;

    let log_level = if args.verbose { "debug" } else { "info" };
    init_tracing(log_level);

    info!("Key frame extraction CLI v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Some(dir) = &args.load_dir {
        let frames = load_frames_from_directory(dir)
            .with_context(|| format!("Failed to load frames from {}", dir.display()))?;
        return output_frames(&frames, &args, None);
    }

    let video_path = args
        .video_path
        .as_deref()
        .context("A video path is required")?;

    if args.show_video_info {
        return show_video_info(video_path, &args.config);
    }

    let start_time = Instant::now();
    let pipeline = KeyframePipeline::new(args.config.clone())?;
    let keyframes = pipeline
        .run(video_path, &args.work_dir)
        .with_context(|| format!("Key frame extraction failed for {}", video_path.display()))?;
    let elapsed = start_time.elapsed();

    if args.output_format == OutputFormat::Detailed {
        println!("Key Frame Extraction Results:");
        println!("  Video: {}", keyframes.video.description());
        println!("  Chunks: {}", keyframes.chunk_count);
        println!("  Extracted: {} frames", keyframes.extracted);
        println!("  Removed as duplicates: {}", keyframes.removed());
        println!("  Time: {:.2}s", elapsed.as_secs_f64());
    }
    output_frames(&keyframes.frames, &args, Some(elapsed))?;

    info!("Completed in {:.2}s, kept {} of {} frames",
          elapsed.as_secs_f64(), keyframes.frames.len(), keyframes.extracted);
    Ok(())
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {0} <video_path> [OPTIONS]\n       {0} --load <frames_dir> [OPTIONS]\n\n\
        Options:\n\
        --work-dir <dir>          Output directory (default: work)\n\
        --scene-threshold <v>     Scene change threshold 0.0-1.0 (default: 0.3)\n\
        --min-interval <secs>     Minimum seconds between frames (default: 5.0)\n\
        --chunk-duration <secs>   Split videos longer than this (default: 600)\n\
        --max-dimension <px>      Longest frame side (default: 1568)\n\
        --similarity <v>          Duplicate similarity 0.0-1.0 (default: 0.90)\n\
        --workers <n>             Chunks processed in parallel\n\
        --timeout <secs>          Per-command timeout, 0 disables (default: 600)\n\
        --load <dir>              List frames of an existing frames directory\n\
        --info                    Show video information only\n\
        --format <fmt>            Output format: simple|detailed|json (default: simple)\n\
        --verbose                 Enable debug logging\n\
        --help                    Show this help message",
        program
    )
}

fn parse_args(args: &[String]) -> anyhow::Result<Args> {
    let program = args.first().map(String::as_str).unwrap_or("keyframe-extract");
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = || flag_value(args, i, flag);

        match flag {
            "--work-dir" => parsed.work_dir = PathBuf::from(value()?),
            "--load" => parsed.load_dir = Some(PathBuf::from(value()?)),
            "--scene-threshold" => parsed.config.scene_threshold = parse_number(flag, value()?)?,
            "--min-interval" => parsed.config.min_interval = parse_number(flag, value()?)?,
            "--chunk-duration" => parsed.config.chunk_duration = parse_number(flag, value()?)?,
            "--max-dimension" => parsed.config.max_image_dimension = parse_number(flag, value()?)?,
            "--similarity" => parsed.config.similarity_threshold = parse_number(flag, value()?)?,
            "--workers" => parsed.config.max_workers = parse_number(flag, value()?)?,
            "--timeout" => {
                let secs: u64 = parse_number(flag, value()?)?;
                parsed.config.command_timeout = (secs > 0).then(|| Duration::from_secs(secs));
            }
            "--format" => {
                parsed.output_format = match value()? {
                    "simple" => OutputFormat::Simple,
                    "detailed" => OutputFormat::Detailed,
                    "json" => OutputFormat::Json,
                    _ => bail!("Invalid format. Use 'simple', 'detailed', or 'json'"),
                };
            }
            "--info" => parsed.show_video_info = true,
            "--verbose" => parsed.verbose = true,
            "--help" => bail!(usage(program)),
            _ if flag.starts_with("--") => bail!("Unknown option: {}\n\n{}", flag, usage(program)),
            _ if parsed.video_path.is_none() => parsed.video_path = Some(PathBuf::from(flag)),
            _ => bail!("Unexpected argument: {}", flag),
        }

        i += if takes_value(flag) { 2 } else { 1 };
    }

    if parsed.video_path.is_none() && parsed.load_dir.is_none() {
        bail!(usage(program));
    }

    Ok(parsed)
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> anyhow::Result<&'a str> {
    args.get(i + 1)
        .map(String::as_str)
        .with_context(|| format!("{} requires a value", flag))
}

fn takes_value(flag: &str) -> bool {
    matches!(
        flag,
        "--work-dir" | "--load" | "--scene-threshold" | "--min-interval" | "--chunk-duration"
            | "--max-dimension" | "--similarity" | "--workers" | "--timeout" | "--format"
    )
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> anyhow::Result<T> {
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid value for {}: {}", flag, value))
}

fn show_video_info(video_path: &Path, config: &PipelineConfig) -> anyhow::Result<()> {
    let toolchain = Toolchain::from_config(config);
    toolchain.check_available()?;

    let video = probe_video(&toolchain, video_path)
        .with_context(|| format!("Failed to probe {}", video_path.display()))?;

    println!("Video Information:");
    println!("  Path: {}", video_path.display());
    println!("  Dimensions: {}x{}", video.width, video.height);
    println!("  Frame Rate: {:.2} fps", video.fps);
    println!("  Codec: {}", video.codec);
    println!("  Duration: {:.2} seconds", video.duration);
    println!("  Chunks: {}", keyframe_extract::plan_chunk_count(video.duration, config.chunk_duration));
    Ok(())
}

fn output_frames(frames: &[Frame], args: &Args, elapsed: Option<Duration>) -> anyhow::Result<()> {
    match args.output_format {
        OutputFormat::Simple => {
            for frame in frames {
                println!("{}", frame.path.display());
            }
        }
        OutputFormat::Detailed => {
            println!("  Frames kept: {}", frames.len());
            for (i, frame) in frames.iter().enumerate() {
                println!("    {:>4}. {:>9.2}s  {}", i + 1, frame.timestamp, frame.path.display());
            }
        }
        OutputFormat::Json => {
            let json_output = serde_json::json!({
                "video_path": args.video_path,
                "elapsed_ms": elapsed.map(|d| d.as_millis() as u64),
                "frame_count": frames.len(),
                "frames": frames
                    .iter()
                    .map(|f| serde_json::json!({
                        "path": f.path,
                        "timestamp": f.timestamp,
                    }))
                    .collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&json_output)?);
        }
    }
    Ok(())
}
