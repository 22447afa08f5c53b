//! Execution state models

use crate::core::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Overall pipeline outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    Succeeded,
    Failed,
}

/// Status of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    /// Stage has not started
    Pending,
    /// Stage is executing steps
    Running,
    /// Every step succeeded or was absorbed as best-effort
    Succeeded,
    /// A step failed and the failure propagates to the pipeline
    Failed,
    /// A step failed inside a best-effort stage
    SkippedBestEffort,
}

impl StageStatus {
    /// Check if the stage is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageStatus::Succeeded | StageStatus::Failed | StageStatus::SkippedBestEffort
        )
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageStatus::Pending => "Pending",
            StageStatus::Running => "Running",
            StageStatus::Succeeded => "Succeeded",
            StageStatus::Failed => "Failed",
            StageStatus::SkippedBestEffort => "SkippedBestEffort",
        };
        f.write_str(name)
    }
}

/// Per-stage state machine: `Pending -> Running -> terminal`
#[derive(Debug, Clone)]
pub struct StageLifecycle {
    status: StageStatus,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl StageLifecycle {
    pub fn new() -> Self {
        Self {
            status: StageStatus::Pending,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn status(&self) -> StageStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Move from `Pending` to `Running`
    pub fn start(&mut self) -> Result<(), PipelineError> {
        self.transition(StageStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Move from `Running` to a terminal status
    pub fn finish(&mut self, status: StageStatus) -> Result<(), PipelineError> {
        if !status.is_terminal() {
            return Err(self.invalid(status));
        }
        self.transition(status)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, to: StageStatus) -> Result<(), PipelineError> {
        let allowed = match (self.status, to) {
            (StageStatus::Pending, StageStatus::Running) => true,
            (StageStatus::Running, next) => next.is_terminal(),
            _ => false,
        };
        if !allowed {
            return Err(self.invalid(to));
        }
        self.status = to;
        Ok(())
    }

    fn invalid(&self, to: StageStatus) -> PipelineError {
        PipelineError::InvalidTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}

impl Default for StageLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Record of one executed step (redacted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,

    /// Command as displayed, with secrets masked
    pub command: String,

    /// Exit code, `None` when the step timed out or was cancelled
    pub exit_code: Option<i32>,

    pub timed_out: bool,

    pub cancelled: bool,

    /// Captured output, with secrets masked
    pub output: String,

    /// Failure absorbed because the step is best-effort
    pub absorbed: bool,

    pub duration_ms: u64,
}

impl StepRecord {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Terminal result of a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    pub name: String,
    pub status: StageStatus,
    pub steps: Vec<StepRecord>,

    /// Why the stage did not succeed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Result of a whole pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub execution_id: Uuid,
    pub pipeline_name: String,
    pub status: PipelineStatus,

    /// Every stage that started, in execution order
    pub stages: Vec<StageResult>,

    /// Run was stopped by a cancellation request
    pub aborted: bool,

    /// Fatal error that aborted the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Succeeded
    }

    /// Look up the result of a stage that started
    pub fn stage(&self, name: &str) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Names of the stages that started, in order
    pub fn executed_stages(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }
}
