//! Capture through external executables.
//!
//! The screenshot tool (grim by default) grabs the window rectangle into a
//! scratch PNG:
//!
//! - `grim -g "X,Y WxH" raw.png`
//!
//! and the resize tool (ImageMagick `magick`, or legacy `convert`) scales it
//! into the thumbnail bounding box, keeping the aspect ratio:
//!
//! - `magick raw.png -resize WxH thumb.png`
//!
//! Each invocation is bounded by a timeout; a hung tool is killed and reaped.

use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::process::{Child, Command, Output, Stdio};
use std::sync::OnceLock;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use super::{CapturePipeline, Region, ThumbnailSize};
use crate::config::CaptureConfig;
use crate::error::{CacheError, CacheResult};
use crate::probe::ProbeReport;

/// Poll interval while waiting on a tool.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Check whether an executable is on `PATH`.
pub fn command_exists(command: &str) -> bool {
    which::which(command).is_ok()
}

/// Pipeline backed by a screenshot tool and an image resize tool.
#[derive(Debug)]
pub struct ExternalPipeline {
    capture_tool: String,
    resize_tools: Vec<String>,
    timeout: Duration,
    /// First resize tool from the preference list that exists
    resolved_resize: OnceLock<Option<String>>,
}

impl ExternalPipeline {
    pub fn new(
        capture_tool: impl Into<String>,
        resize_tools: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            capture_tool: capture_tool.into(),
            resize_tools,
            timeout,
            resolved_resize: OnceLock::new(),
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(
            config.capture_tool.clone(),
            config.resize_tools.clone(),
            Duration::from_secs(config.tool_timeout_secs),
        )
    }

    /// The resize command to use, resolved on first call.
    pub fn resize_command(&self) -> Option<&str> {
        self.resolved_resize
            .get_or_init(|| {
                self.resize_tools
                    .iter()
                    .find(|tool| !tool.trim().is_empty() && command_exists(tool))
                    .cloned()
            })
            .as_deref()
    }

    fn run(&self, tool: &str, args: Vec<OsString>) -> CacheResult<()> {
        let mut child = Command::new(tool)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CacheError::Spawn {
                tool: tool.to_string(),
                source,
            })?;

        match wait_with_timeout(&mut child, self.timeout) {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => Err(CacheError::ToolFailed {
                tool: tool.to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Err(CacheError::ToolTimeout {
                tool: tool.to_string(),
                timeout: self.timeout,
            }),
            Err(e) => Err(CacheError::Io(e)),
        }
    }
}

impl CapturePipeline for ExternalPipeline {
    fn name(&self) -> &'static str {
        "external"
    }

    fn probe(&self) -> ProbeReport {
        ProbeReport {
            capture_tool: command_exists(&self.capture_tool).then(|| self.capture_tool.clone()),
            resize_tool: self.resize_command().map(str::to_string),
        }
    }

    fn capture(&self, region: &Region, size: ThumbnailSize) -> CacheResult<Vec<u8>> {
        region.validate()?;
        let resize_tool = self.resize_command().ok_or(CacheError::ToolsUnavailable)?;

        // Scratch space outside the cache dir; removed when dropped
        let scratch = tempfile::Builder::new().prefix("winthumb-").tempdir()?;
        let raw = scratch.path().join("raw.png");
        let thumb = scratch.path().join("thumb.png");

        self.run(
            &self.capture_tool,
            vec!["-g".into(), region.geometry().into(), raw.clone().into()],
        )?;
        self.run(
            resize_tool,
            vec![
                raw.into(),
                "-resize".into(),
                format!("{}x{}", size.width, size.height).into(),
                thumb.clone().into(),
            ],
        )?;

        let bytes = fs::read(&thumb)?;
        debug!(geometry = %region.geometry(), bytes = bytes.len(), "captured region");
        Ok(bytes)
    }
}

/// Read a child's pipe to the end on its own thread, so a tool that writes
/// more than the pipe buffer holds does not stall waiting for us.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf).ok();
            buf
        })
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Wait for a child process with a timeout.
///
/// Polls `try_wait` since std has no native timeout. Piped output is drained
/// while waiting. On expiry the child is killed and reaped so no zombie is
/// left behind, and an error of kind `TimedOut` is returned; the readers are
/// detached since a grandchild may still hold the pipes open.
pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Output> {
    let start = Instant::now();
    let stdout_reader = drain(child.stdout.take());
    let stderr_reader = drain(child.stderr.take());

    loop {
        match child.try_wait()? {
            Some(status) => {
                return Ok(Output {
                    status,
                    stdout: collect(stdout_reader),
                    stderr: collect(stderr_reader),
                });
            }
            None => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "Process timed out",
                    ));
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}
