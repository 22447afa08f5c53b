//! Runner configuration

use std::path::PathBuf;

/// Configuration for the shell runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Shell executable, invoked as `<shell> -c <command>`
    pub shell: String,

    /// Default working directory for commands
    pub working_dir: Option<PathBuf>,

    /// Start commands with an empty environment instead of inheriting ours
    pub clear_env: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            working_dir: None,
            clear_env: false,
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_clear_env(mut self, clear_env: bool) -> Self {
        self.clear_env = clear_env;
        self
    }
}
