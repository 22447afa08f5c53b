//! Step executor - runs individual steps through a command runner

use crate::{
    core::{CredentialScope, EnvironmentStore, PipelineError, Step},
    execution::CancellationToken,
    runner::{CommandRunner, Invocation},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// What running a step produced
///
/// A non-zero exit is data, not an error: the stage runner decides whether it
/// matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The command finished on its own
    Exited { exit_code: i32, output: String },
    /// The command was killed after exceeding its timeout
    TimedOut { after: Duration },
    /// The command was killed by a cancellation request
    Cancelled,
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Exited { exit_code: 0, .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StepOutcome::Cancelled)
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            StepOutcome::Exited { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Captured (redacted) output
    pub fn output(&self) -> &str {
        match self {
            StepOutcome::Exited { output, .. } => output,
            _ => "",
        }
    }

    /// The error this outcome represents, if it is a failure
    pub fn to_error(&self, step: &str) -> Option<PipelineError> {
        match self {
            StepOutcome::Exited { exit_code: 0, .. } => None,
            StepOutcome::Exited { exit_code, .. } => Some(PipelineError::StepFailed {
                step: step.to_string(),
                exit_code: *exit_code,
            }),
            StepOutcome::TimedOut { after } => Some(PipelineError::TimedOut {
                step: step.to_string(),
                after: *after,
            }),
            StepOutcome::Cancelled => Some(PipelineError::PipelineAborted),
        }
    }
}

/// Executes a single step
pub struct StepExecutor<R> {
    runner: Arc<R>,
    working_dir: Option<PathBuf>,
    cancel: CancellationToken,
}

impl<R: CommandRunner> StepExecutor<R> {
    pub fn new(runner: Arc<R>, cancel: CancellationToken) -> Self {
        Self {
            runner,
            working_dir: None,
            cancel,
        }
    }

    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Execute a step and report its outcome
    ///
    /// Returns `Err` only for configuration defects found while rendering
    /// (unbound variables, credentials missing from the scope).
    pub async fn run(
        &self,
        step: &Step,
        env: &EnvironmentStore,
        creds: &CredentialScope<'_>,
    ) -> Result<StepOutcome, PipelineError> {
        let invocation = self.prepare(step, env, creds)?;
        Ok(self.execute(step, &invocation, creds).await)
    }

    /// Render a step into the invocation that would run it
    ///
    /// The display form is masked against every secret in the scope, so a
    /// value that arrives through an environment key is hidden too.
    pub fn prepare(
        &self,
        step: &Step,
        env: &EnvironmentStore,
        creds: &CredentialScope<'_>,
    ) -> Result<Invocation, PipelineError> {
        let rendered = step.render(env, creds)?;
        Ok(Invocation {
            display: creds.redact(&rendered.display),
            command: rendered.command,
            env: step.process_env(env, creds)?,
            working_dir: self.working_dir.clone(),
        })
    }

    /// Run a prepared invocation under the step's timeout and the cancellation token
    pub async fn execute(
        &self,
        step: &Step,
        invocation: &Invocation,
        creds: &CredentialScope<'_>,
    ) -> StepOutcome {
        if self.cancel.is_cancelled() {
            info!("Step {} cancelled before start", step.name);
            return StepOutcome::Cancelled;
        }

        info!("Executing step {}: {}", step.name, invocation.display);

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!("Step {} cancelled", step.name);
                StepOutcome::Cancelled
            }
            result = timeout(step.timeout, self.runner.run(invocation)) => match result {
                Ok(Ok(output)) => StepOutcome::Exited {
                    exit_code: output.exit_code,
                    output: creds.redact(&output.combined()),
                },
                Ok(Err(e)) => {
                    let message = creds.redact(&e.to_string());
                    error!("Runner error for step {}: {}", step.name, message);
                    StepOutcome::Exited {
                        exit_code: -1,
                        output: message,
                    }
                }
                Err(_) => {
                    error!("Timeout for step {} after {:?}", step.name, step.timeout);
                    StepOutcome::TimedOut { after: step.timeout }
                }
            },
        };

        debug!("Step {} outcome: {:?}", step.name, outcome);
        outcome
    }
}
