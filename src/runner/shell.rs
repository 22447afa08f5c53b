//! Shell subprocess runner - runs commands through `sh -c`

use crate::runner::{CommandOutput, CommandRunner, Invocation, RunnerConfig, RunnerError};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs each invocation as `<shell> -c <command>`
///
/// On unix the shell leads its own process group. When the returned future
/// is dropped before the shell exits, the whole group is killed, which is how
/// the step executor enforces timeouts and cancellation on compound commands.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    config: RunnerConfig,
}

impl ShellRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunnerError> {
        debug!("Spawning {} for: {}", self.config.shell, invocation.display);

        let mut command = Command::new(&self.config.shell);
        command
            .arg("-c")
            .arg(&invocation.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if self.config.clear_env {
            command.env_clear();
        }
        command.envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        if let Some(dir) = invocation.working_dir.as_ref().or(self.config.working_dir.as_ref()) {
            command.current_dir(dir);
        }

        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|source| RunnerError::Spawn {
            program: self.config.shell.clone(),
            source,
        })?;
        let group = ProcessGroupGuard::new(child.id());

        let output = child.wait_with_output().await.map_err(|source| RunnerError::Wait {
            program: self.config.shell.clone(),
            source,
        })?;
        group.disarm();

        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code != 0 {
            warn!("Command exited with code {}: {}", exit_code, invocation.display);
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!("Command returned {} bytes of output", stdout.len() + stderr.len());

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

/// Kills the step's process group unless the shell finished on its own
struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn disarm(mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_process_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    debug!("Killing process group {}", pgid);
    // A group that already exited yields ESRCH, which is fine to ignore.
    unsafe {
        libc::killpg(pgid as libc::pid_t, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}
