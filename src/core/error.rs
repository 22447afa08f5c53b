//! Pipeline error taxonomy

use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or executing a pipeline
///
/// `UnboundVariable` and the credential variants are configuration defects
/// and abort a run immediately. `StepFailed` and `TimedOut` describe step
/// outcomes once they have been judged by the stage runner.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),

    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    #[error("Credential '{id}' could not be resolved: {reason}")]
    CredentialUnavailable { id: String, reason: String },

    #[error("Credential '{0}' is already held by another scope")]
    CredentialInUse(String),

    #[error("Environment is sealed, cannot set '{0}'")]
    EnvironmentSealed(String),

    #[error("Step '{step}' failed with exit code {exit_code}")]
    StepFailed { step: String, exit_code: i32 },

    #[error("Step '{step}' timed out after {after:?}")]
    TimedOut { step: String, after: Duration },

    #[error("Pipeline aborted")]
    PipelineAborted,

    #[error("Invalid stage transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl PipelineError {
    /// Whether this error must abort the run regardless of best-effort marking
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::UnboundVariable(_)
                | PipelineError::CredentialNotFound(_)
                | PipelineError::CredentialUnavailable { .. }
                | PipelineError::CredentialInUse(_)
                | PipelineError::EnvironmentSealed(_)
                | PipelineError::InvalidTransition { .. }
                | PipelineError::Validation(_)
        )
    }
}
