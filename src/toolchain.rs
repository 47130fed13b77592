//! External toolchain invocation
//!
//! Every pipeline stage does its real work inside an ffmpeg/ffprobe process.
//! This module models each such call as a typed [`ToolCommand`] with a single
//! execution-and-decode boundary: spawn, drain output, enforce the deadline,
//! check the exit status, and verify the files the call was expected to write.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, trace, warn};
use crate::common::{KeyframeError, Result};
use crate::config::PipelineConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Number of trailing stderr lines kept in error messages
const STDERR_TAIL_LINES: usize = 20;

/// Deadline for the `-version` availability check
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Full-decode calls may take this many times the media's length
const DECODE_TIME_FACTOR: f64 = 3.0;

/// Captured output of a successful tool invocation
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A single external process call
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
    expected_outputs: Vec<PathBuf>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            expected_outputs: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Require `path` to exist once the process exits successfully
    pub fn expect_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.expected_outputs.push(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Run the process to completion
    ///
    /// # Errors
    /// * `MissingDependency` - If the program is not on the PATH
    /// * `SpawnFailed` - If the process could not be started for another reason
    /// * `SubprocessTimeout` - If the deadline passed; the process is killed
    /// * `SubprocessFailed` - If the process exited with a non-zero status
    /// * `MissingOutput` - If an expected output file was not written
    #[instrument(skip(self), fields(program = %self.program))]
    pub fn run(&self) -> Result<ToolOutput> {
        trace!("Running {} {:?}", self.program, self.args);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    KeyframeError::MissingDependency { binary: self.program.clone() }
                } else {
                    KeyframeError::SpawnFailed { program: self.program.clone(), source: e }
                }
            })?;

        // Pipes are drained concurrently so a chatty process never blocks on a full buffer
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let status = self.wait(&mut child);

        let stdout = join_reader(stdout_reader);
        let stderr = join_reader(stderr_reader);
        let status = status?;

        if !status.success() {
            warn!("{} failed with {}", self.program, status);
            return Err(KeyframeError::SubprocessFailed {
                program: self.program.clone(),
                status: status.to_string(),
                stderr: stderr_tail(&stderr),
            });
        }

        for path in &self.expected_outputs {
            if !path.exists() {
                return Err(KeyframeError::MissingOutput {
                    program: self.program.clone(),
                    path: path.display().to_string(),
                });
            }
        }

        debug!("{} completed ({} bytes stdout, {} bytes stderr)",
               self.program, stdout.len(), stderr.len());

        Ok(ToolOutput { stdout, stderr })
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if started.elapsed() > timeout {
                warn!("{} exceeded {:?}, killing", self.program, timeout);
                let _ = child.kill();
                let _ = child.wait();
                return Err(KeyframeError::SubprocessTimeout {
                    program: self.program.clone(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer);
            buffer
        })
    })
}

fn join_reader(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// The ffmpeg/ffprobe pair used by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Toolchain {
    ffmpeg: String,
    ffprobe: String,
    timeout: Option<Duration>,
}

impl Toolchain {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            timeout,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.ffmpeg.clone(), config.ffprobe.clone(), config.command_timeout)
    }

    /// A quiet ffmpeg invocation that overwrites outputs
    pub fn ffmpeg(&self) -> ToolCommand {
        ToolCommand::new(&self.ffmpeg)
            .args(["-hide_banner", "-nostdin", "-y"])
            .timeout(self.timeout)
    }

    /// Deadline for a call that decodes `media_seconds` of video
    ///
    /// Never shorter than the configured timeout; `None` stays unbounded.
    pub fn decode_timeout(&self, media_seconds: f64) -> Option<Duration> {
        self.timeout.map(|base| {
            Duration::try_from_secs_f64(media_seconds * DECODE_TIME_FACTOR)
                .map_or(base, |scaled| scaled.max(base))
        })
    }

    pub fn ffprobe(&self) -> ToolCommand {
        ToolCommand::new(&self.ffprobe)
            .args(["-v", "error"])
            .timeout(self.timeout)
    }

    /// Fail before any work begins if either binary cannot be run
    #[instrument(skip(self))]
    pub fn check_available(&self) -> Result<()> {
        for binary in [&self.ffmpeg, &self.ffprobe] {
            ToolCommand::new(binary.as_str())
                .arg("-version")
                .timeout(Some(VERSION_CHECK_TIMEOUT))
                .run()
                .map_err(|e| {
                    warn!("{} is not usable: {}", binary, e);
                    KeyframeError::MissingDependency { binary: binary.clone() }
                })?;
            debug!("Found {}", binary);
        }
        Ok(())
    }
}

impl Default for Toolchain {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Render a path as a command argument
pub(crate) fn path_arg(path: &Path) -> OsString {
    path.as_os_str().to_os_string()
}
