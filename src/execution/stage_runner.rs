//! Stage runner - runs a stage's steps in order under one credential scope

use crate::{
    core::{
        CredentialVault, EnvironmentStore, PipelineError, Stage, StageLifecycle, StageResult,
        StageStatus, Step, StepRecord,
    },
    execution::{EventBus, ExecutionEvent, StepExecutor, StepOutcome},
    runner::CommandRunner,
};
use std::time::Instant;
use tracing::{error, info, warn};

/// Outcome of running one stage
#[derive(Debug, Clone)]
pub struct StageRun {
    /// Terminal result, always present
    pub result: StageResult,

    /// Error that must halt the pipeline
    ///
    /// `None` for `Succeeded` stages and for best-effort stages that were
    /// not cancelled.
    pub failure: Option<PipelineError>,
}

impl StageRun {
    pub fn halts_pipeline(&self) -> bool {
        self.failure.is_some()
    }
}

/// Runs stages through a step executor, reporting to an event bus
pub struct StageRunner<'a, R> {
    executor: &'a StepExecutor<R>,
    events: &'a EventBus,
}

/// How the step loop ended
enum Stop {
    Completed,
    /// A step failed; the stage's best-effort flag decides what it means
    StepFailed(PipelineError),
    /// Fatal error or cancellation, always halts
    Halt(PipelineError),
}

impl<'a, R: CommandRunner> StageRunner<'a, R> {
    pub fn new(executor: &'a StepExecutor<R>, events: &'a EventBus) -> Self {
        Self { executor, events }
    }

    /// Run every step of `stage` in declared order
    pub async fn run(
        &self,
        stage: &Stage,
        env: &EnvironmentStore,
        vault: &CredentialVault,
    ) -> StageRun {
        let mut lifecycle = StageLifecycle::new();
        if let Err(e) = lifecycle.start() {
            return self.finish(stage, lifecycle, Vec::new(), Stop::Halt(e)).await;
        }

        info!("Starting stage: {}", stage.name);
        self.events
            .emit(ExecutionEvent::StageStarted {
                stage: stage.name.clone(),
            })
            .await;

        let mut records = Vec::new();
        let stop = match vault.acquire(stage.credential_ids()) {
            Ok(scope) => {
                let mut stop = Stop::Completed;
                for step in &stage.steps {
                    if self.executor.cancellation().is_cancelled() {
                        stop = Stop::Halt(PipelineError::PipelineAborted);
                        break;
                    }

                    let invocation = match self.executor.prepare(step, env, &scope) {
                        Ok(invocation) => invocation,
                        Err(e) => {
                            error!("Step {} in stage {}: {}", step.name, stage.name, e);
                            stop = Stop::Halt(e);
                            break;
                        }
                    };

                    self.events
                        .emit(ExecutionEvent::StepStarted {
                            stage: stage.name.clone(),
                            step: step.name.clone(),
                            command: invocation.display.clone(),
                        })
                        .await;

                    let started = Instant::now();
                    let outcome = self.executor.execute(step, &invocation, &scope).await;
                    let failure = outcome.to_error(&step.name);
                    let absorbed = failure.is_some() && step.best_effort && !outcome.is_cancelled();

                    let record = step_record(step, &invocation.display, &outcome, absorbed, started);
                    records.push(record.clone());
                    self.events
                        .emit(ExecutionEvent::StepFinished {
                            stage: stage.name.clone(),
                            record,
                        })
                        .await;

                    match failure {
                        None => {}
                        Some(e) if absorbed => {
                            warn!("Best-effort step {} failed, continuing: {}", step.name, e);
                        }
                        Some(PipelineError::PipelineAborted) => {
                            stop = Stop::Halt(PipelineError::PipelineAborted);
                            break;
                        }
                        Some(e) => {
                            stop = Stop::StepFailed(e);
                            break;
                        }
                    }
                }
                // Release the credentials before the stage is reported finished
                drop(scope);
                stop
            }
            Err(e) => {
                error!("Stage {} could not acquire credentials: {}", stage.name, e);
                Stop::Halt(e)
            }
        };

        self.finish(stage, lifecycle, records, stop).await
    }

    async fn finish(
        &self,
        stage: &Stage,
        mut lifecycle: StageLifecycle,
        steps: Vec<StepRecord>,
        stop: Stop,
    ) -> StageRun {
        // (status, error, halts the pipeline)
        let (status, failure, halts) = match stop {
            Stop::Completed => (StageStatus::Succeeded, None, false),
            Stop::StepFailed(e) if stage.best_effort => (StageStatus::SkippedBestEffort, Some(e), false),
            Stop::StepFailed(e) => (StageStatus::Failed, Some(e), true),
            Stop::Halt(PipelineError::PipelineAborted) if stage.best_effort => (
                StageStatus::SkippedBestEffort,
                Some(PipelineError::PipelineAborted),
                true,
            ),
            Stop::Halt(e) => (StageStatus::Failed, Some(e), true),
        };

        if let Err(e) = lifecycle.finish(status) {
            error!("Stage {}: {}", stage.name, e);
        }

        let error = failure.as_ref().map(|e| e.to_string());
        match status {
            StageStatus::Succeeded => info!("Stage {} succeeded", stage.name),
            StageStatus::SkippedBestEffort => {
                warn!("Best-effort stage {} did not succeed: {:?}", stage.name, error)
            }
            _ => error!("Stage {} failed: {:?}", stage.name, error),
        }

        let result = StageResult {
            name: stage.name.clone(),
            status: lifecycle.status(),
            steps,
            error,
            started_at: lifecycle.started_at(),
            finished_at: lifecycle.finished_at(),
        };

        self.events
            .emit(ExecutionEvent::StageFinished {
                result: result.clone(),
            })
            .await;

        StageRun {
            result,
            failure: failure.filter(|_| halts),
        }
    }
}

fn step_record(
    step: &Step,
    display: &str,
    outcome: &StepOutcome,
    absorbed: bool,
    started: Instant,
) -> StepRecord {
    StepRecord {
        name: step.name.clone(),
        command: display.to_string(),
        exit_code: outcome.exit_code(),
        timed_out: matches!(outcome, StepOutcome::TimedOut { .. }),
        cancelled: outcome.is_cancelled(),
        output: outcome.output().to_string(),
        absorbed,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}
