//! One-shot detection of the capture and resize tools.

use std::fmt;

use tracing::{debug, info};

use crate::capture::CapturePipeline;

/// Tools a pipeline found on the system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Screenshot executable, if found
    pub capture_tool: Option<String>,
    /// Resize executable chosen from the preference list, if any was found
    pub resize_tool: Option<String>,
}

impl ProbeReport {
    /// Both halves of the pipeline are present.
    pub fn is_complete(&self) -> bool {
        self.capture_tool.is_some() && self.resize_tool.is_some()
    }
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |tool: &Option<String>| tool.clone().unwrap_or_else(|| "missing".to_string());
        write!(
            f,
            "capture: {}, resize: {}",
            show(&self.capture_tool),
            show(&self.resize_tool)
        )
    }
}

/// Availability verdict, fixed for the lifetime of a cache.
///
/// Tools are assumed not to appear or vanish while the process runs, so
/// there is no way to re-probe.
#[derive(Debug, Clone)]
pub struct ToolProbe {
    report: ProbeReport,
}

impl ToolProbe {
    /// Ask the pipeline which tools it can use and freeze the answer.
    pub fn check_capture_tools(pipeline: &dyn CapturePipeline) -> Self {
        let report = pipeline.probe();
        if report.is_complete() {
            debug!(pipeline = pipeline.name(), %report, "capture tools found");
        } else {
            info!(
                pipeline = pipeline.name(),
                %report,
                "capture tools missing, thumbnails disabled"
            );
        }
        Self { report }
    }

    /// A probe that never allows captures.
    pub fn unavailable() -> Self {
        Self {
            report: ProbeReport::default(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.report.is_complete()
    }

    pub fn report(&self) -> &ProbeReport {
        &self.report
    }
}
