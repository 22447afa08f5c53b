//! Core domain models for Pipeline
//!
//! This module defines the fundamental data structures that represent
//! pipelines, stages, steps, their environment and credentials.

pub mod config;
pub mod credentials;
pub mod environment;
pub mod error;
pub mod pipeline;
pub mod state;
pub mod step;

pub use credentials::{CredentialScope, CredentialSource, CredentialVault};
pub use environment::EnvironmentStore;
pub use error::PipelineError;
pub use pipeline::*;
pub use state::*;
pub use step::*;
