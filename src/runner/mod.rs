//! Command runners - how a rendered step reaches the outside world

pub mod config;
pub mod response;
pub mod shell;

#[cfg(test)]
pub(crate) mod mock;

use crate::core::credentials::wipe;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

pub use config::RunnerConfig;
pub use response::{CommandOutput, RunnerError};
pub use shell::ShellRunner;

/// A fully rendered command ready to run
///
/// `command` and the `env` values may hold plain copies of secrets; they are
/// zeroed when the invocation is dropped, like a [`Secret`]. Copies made by
/// the operating system for the child process are out of reach.
///
/// [`Secret`]: crate::core::credentials::Secret
#[derive(Clone)]
pub struct Invocation {
    /// Command text, may contain secrets
    pub command: String,

    /// Command text with secrets masked
    pub display: String,

    /// Variables exported to the process
    pub env: Vec<(String, String)>,

    /// Working directory (None = inherit)
    pub working_dir: Option<PathBuf>,
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("Invocation")
            .field("command", &self.display)
            .field("env", &keys)
            .field("working_dir", &self.working_dir)
            .finish()
    }
}

impl Drop for Invocation {
    fn drop(&mut self) {
        wipe(&mut self.command);
        for (_, value) in &mut self.env {
            wipe(value);
        }
    }
}

/// Trait for command execution - allows for different implementations
///
/// Implementations only run the command and report what happened. A
/// non-zero exit code is a normal `Ok` result; `Err` is reserved for
/// failing to run the command at all.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunnerError>;
}
