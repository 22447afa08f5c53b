//! stageline - declarative build, push and deploy pipelines

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod runner;

// Re-export commonly used types
pub use core::{
    CredentialScope, CredentialSource, CredentialVault, EnvironmentStore, Pipeline, PipelineError,
    PipelineResult, PipelineStatus, Stage, StageResult, StageStatus, Step, StepRecord,
};
pub use execution::{CancellationToken, ExecutionEngine, ExecutionEvent, StepOutcome};
pub use runner::{CommandOutput, CommandRunner, Invocation, RunnerConfig, RunnerError, ShellRunner};
