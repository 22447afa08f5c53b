//! Pipeline execution engine

pub mod cancel;
pub mod engine;
pub mod events;
pub mod executor;
pub mod stage_runner;

pub use cancel::CancellationToken;
pub use engine::ExecutionEngine;
pub use events::{EventBus, EventHandler, ExecutionEvent};
pub use executor::{StepExecutor, StepOutcome};
pub use stage_runner::{StageRun, StageRunner};
