//! Execution events and their subscribers

use crate::core::{PipelineStatus, StageResult, StepRecord};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Events that can occur during pipeline execution
///
/// Events only ever carry redacted commands and output.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        total_stages: usize,
    },
    StageStarted {
        stage: String,
    },
    StepStarted {
        stage: String,
        step: String,
        command: String,
    },
    StepFinished {
        stage: String,
        record: StepRecord,
    },
    StageFinished {
        result: StageResult,
    },
    PipelineFinished {
        execution_id: Uuid,
        status: PipelineStatus,
        aborted: bool,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Fan-out of events to registered handlers
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event handler
    pub async fn subscribe<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    pub async fn emit(&self, event: ExecutionEvent) {
        let handlers = self.handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }
}
