//! Step domain model

use crate::core::{
    config::StepConfig, credentials::CredentialScope, credentials::REDACTED,
    environment::EnvironmentStore, error::PipelineError,
};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use std::time::Duration;

/// A single external operation inside a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Step name, unique enough to be recognised in reports
    pub name: String,

    /// Command template, `${KEY}` placeholders name environment keys or credential ids
    pub command: String,

    /// Environment keys the step requires even if the template does not mention them
    pub env: Vec<String>,

    /// Credential ids the step may read
    pub credentials: Vec<String>,

    /// A failure is recorded but does not stop the stage
    pub best_effort: bool,

    /// Upper bound on the command's run time
    pub timeout: Duration,
}

/// A command with placeholders substituted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCommand {
    /// What the shell executes
    pub command: String,

    /// What logs and reports show
    pub display: String,
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.\-]*)\}").expect("placeholder pattern is valid")
    })
}

/// Environment variable name under which a credential is exported
pub fn credential_env_name(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

impl Step {
    /// Create a step with the default timeout
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            env: Vec::new(),
            credentials: Vec::new(),
            best_effort: false,
            timeout: Duration::from_secs(StepDefaults::default().timeout_secs),
        }
    }

    /// Create a step from its configuration
    pub fn from_config(config: &StepConfig, index: usize, defaults: &StepDefaults) -> Self {
        Step {
            name: config
                .name
                .clone()
                .unwrap_or_else(|| format!("step-{}", index + 1)),
            command: config.run.clone(),
            env: config.env.clone(),
            credentials: config.credentials.clone(),
            best_effort: config.best_effort,
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(defaults.timeout_secs)),
        }
    }

    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    pub fn with_credentials<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.credentials.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_env<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Every `${KEY}` mentioned by the command template, in order of appearance
    pub fn placeholders(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        placeholder_regex()
            .captures_iter(&self.command)
            .map(|caps| caps[1].to_string())
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }

    /// Environment keys that must be bound for this step to run
    pub fn required_env_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.env.clone();
        for key in self.placeholders() {
            if !self.credentials.contains(&key) && !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Substitute placeholders from the environment and the credential scope
    pub fn render(
        &self,
        env: &EnvironmentStore,
        creds: &CredentialScope<'_>,
    ) -> Result<RenderedCommand, PipelineError> {
        for key in &self.env {
            env.get(key)?;
        }

        let mut command = String::with_capacity(self.command.len());
        let mut display = String::with_capacity(self.command.len());
        let mut last = 0;

        for caps in placeholder_regex().captures_iter(&self.command) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let key = &caps[1];

            command.push_str(&self.command[last..whole.start]);
            display.push_str(&self.command[last..whole.start]);

            if self.credentials.iter().any(|id| id == key) {
                let secret = creds
                    .get(key)
                    .ok_or_else(|| PipelineError::CredentialNotFound(key.to_string()))?;
                command.push_str(secret);
                display.push_str(REDACTED);
            } else {
                let value = env.get(key)?;
                command.push_str(value);
                display.push_str(value);
            }
            last = whole.end;
        }

        command.push_str(&self.command[last..]);
        display.push_str(&self.command[last..]);

        Ok(RenderedCommand { command, display })
    }

    /// Variables exported to the step's process
    ///
    /// The whole environment store plus this step's credentials, named by
    /// [`credential_env_name`].
    pub fn process_env(
        &self,
        env: &EnvironmentStore,
        creds: &CredentialScope<'_>,
    ) -> Result<Vec<(String, String)>, PipelineError> {
        let mut vars: Vec<(String, String)> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        for id in &self.credentials {
            let secret = creds
                .get(id)
                .ok_or_else(|| PipelineError::CredentialNotFound(id.clone()))?;
            vars.push((credential_env_name(id), secret.to_string()));
        }

        Ok(vars)
    }
}

#[derive(Debug, Clone)]
pub struct StepDefaults {
    pub timeout_secs: u64,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: 300, // 5 minutes
        }
    }
}
