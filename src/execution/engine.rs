//! Main execution engine - orchestrates the entire pipeline run

use crate::{
    core::{EnvironmentStore, Pipeline, PipelineError, PipelineResult, PipelineStatus, StageResult},
    execution::{
        CancellationToken, EventBus, ExecutionEvent, StageRun, StageRunner, StepExecutor,
    },
    runner::CommandRunner,
};
use chrono::Utc;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Main pipeline execution engine
pub struct ExecutionEngine<R> {
    runner: Arc<R>,
    events: EventBus,
    cancel: CancellationToken,
}

impl<R: CommandRunner> ExecutionEngine<R> {
    pub fn new(runner: R) -> Self {
        Self::from_arc(Arc::new(runner))
    }

    /// Build an engine around a runner the caller keeps a handle to
    pub fn from_arc(runner: Arc<R>) -> Self {
        Self {
            runner,
            events: EventBus::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the current run at the next step boundary
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler).await;
    }

    /// Execute the pipeline with its declared environment
    pub async fn execute(&self, pipeline: &Pipeline) -> PipelineResult {
        self.execute_with_environment(pipeline, pipeline.environment_store())
            .await
    }

    /// Execute the pipeline with a caller-prepared environment
    ///
    /// The store is sealed before the first stage starts and dropped when the
    /// run ends.
    pub async fn execute_with_environment(
        &self,
        pipeline: &Pipeline,
        mut env: EnvironmentStore,
    ) -> PipelineResult {
        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!("Starting pipeline execution: {} ({})", pipeline.name, execution_id);
        self.events
            .emit(ExecutionEvent::PipelineStarted {
                execution_id,
                pipeline_name: pipeline.name.clone(),
                total_stages: pipeline.stages.len(),
            })
            .await;

        env.seal();
        let vault = pipeline.vault();
        let executor = StepExecutor::new(self.runner.clone(), self.cancel.clone())
            .with_working_dir(pipeline.workspace.clone());
        let stage_runner = StageRunner::new(&executor, &self.events);

        let mut stages: Vec<StageResult> = Vec::with_capacity(pipeline.stages.len());
        let halt = match pipeline.validate() {
            Err(e) => Some(e),
            Ok(()) => {
                let mut flow = ControlFlow::Continue(());
                for stage in &pipeline.stages {
                    if self.cancel.is_cancelled() {
                        warn!("Cancellation requested, skipping stage {}", stage.name);
                        flow = ControlFlow::Break(PipelineError::PipelineAborted);
                        break;
                    }

                    let StageRun { result, failure } =
                        stage_runner.run(stage, &env, &vault).await;
                    stages.push(result);

                    if let Some(e) = failure {
                        flow = ControlFlow::Break(e);
                        break;
                    }
                }
                match flow {
                    ControlFlow::Continue(()) => None,
                    ControlFlow::Break(e) => Some(e),
                }
            }
        };

        let aborted = matches!(halt, Some(PipelineError::PipelineAborted));
        let status = if halt.is_some() {
            PipelineStatus::Failed
        } else {
            PipelineStatus::Succeeded
        };

        match &halt {
            None => info!("Pipeline {} succeeded", pipeline.name),
            Some(e) => error!("Pipeline {} failed: {}", pipeline.name, e),
        }

        self.events
            .emit(ExecutionEvent::PipelineFinished {
                execution_id,
                status,
                aborted,
            })
            .await;

        PipelineResult {
            execution_id,
            pipeline_name: pipeline.name.clone(),
            status,
            stages,
            aborted,
            error: halt.map(|e| e.to_string()),
            started_at,
            completed_at: Utc::now(),
        }
    }
}
