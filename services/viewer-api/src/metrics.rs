//! Workflow counters and timings, exported through the Prometheus recorder.

use std::time::Instant;

use metrics::{counter, histogram};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    Upload,
    Conversion,
    Composite,
}

impl Workflow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Workflow::Upload => "upload",
            Workflow::Conversion => "conversion",
            Workflow::Composite => "composite",
        }
    }

    fn counter_name(&self) -> &'static str {
        match self {
            Workflow::Upload => "viewer_uploads_total",
            Workflow::Conversion => "viewer_conversions_total",
            Workflow::Composite => "viewer_composites_total",
        }
    }
}

/// Count one run of `workflow` with its outcome.
pub fn record_outcome(workflow: Workflow, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(workflow.counter_name(), "outcome" => outcome).increment(1);
}

/// Measures one workflow run from creation to [`finish`](Self::finish).
pub struct WorkflowTimer {
    workflow: Workflow,
    start: Instant,
}

impl WorkflowTimer {
    pub fn start(workflow: Workflow) -> Self {
        Self {
            workflow,
            start: Instant::now(),
        }
    }

    /// Record the duration and outcome.
    pub fn finish(self, success: bool) {
        histogram!("viewer_workflow_duration_seconds", "workflow" => self.workflow.as_str())
            .record(self.start.elapsed().as_secs_f64());
        record_outcome(self.workflow, success);
    }
}
