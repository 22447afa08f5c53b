//! Pipeline domain model

use crate::core::{
    config::{PipelineConfig, RedeployConfig, StageConfig},
    credentials::{CredentialSource, CredentialVault},
    environment::EnvironmentStore,
    error::PipelineError,
    step::{Step, StepDefaults},
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

/// A pipeline definition, immutable once loaded
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Initial environment bindings
    pub environment: HashMap<String, String>,

    /// Credential declarations
    pub credentials: HashMap<String, CredentialSource>,

    /// Stages in execution order
    pub stages: Vec<Stage>,

    /// Working directory for steps (None = current directory)
    pub workspace: Option<PathBuf>,

    /// Shell used to run commands
    pub shell: String,
}

/// A named, ordered group of steps with a single outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub steps: Vec<Step>,

    /// Failures inside this stage do not abort the pipeline
    pub best_effort: bool,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            best_effort: false,
        }
    }

    /// Create a stage from configuration
    pub fn from_config(config: &StageConfig, defaults: &StepDefaults) -> Self {
        let mut steps: Vec<Step> = config
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| Step::from_config(step, index, defaults))
            .collect();

        if let Some(redeploy) = &config.redeploy {
            steps.extend(Self::redeploy_steps(
                redeploy,
                Duration::from_secs(defaults.timeout_secs),
            ));
        }

        Stage {
            name: config.name.clone(),
            steps,
            best_effort: config.best_effort,
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    /// Stage that replaces a named container with a fresh one
    ///
    /// Removal of the previous instance is best-effort, so re-running the
    /// stage against an existing or absent container converges to exactly
    /// one running instance.
    pub fn redeploy(
        name: impl Into<String>,
        container: impl Into<String>,
        image: impl Into<String>,
        run_args: Option<String>,
    ) -> Self {
        let config = RedeployConfig {
            container: container.into(),
            image: image.into(),
            args: run_args,
            cli: None,
        };
        let timeout = Duration::from_secs(StepDefaults::default().timeout_secs);

        Stage {
            name: name.into(),
            steps: Self::redeploy_steps(&config, timeout),
            best_effort: false,
        }
    }

    fn redeploy_steps(config: &RedeployConfig, timeout: Duration) -> Vec<Step> {
        let cli = config.cli.as_deref().unwrap_or("docker");

        let remove = Step::new("remove-previous", format!("{} rm -f {}", cli, config.container))
            .best_effort()
            .with_timeout(timeout);

        let run_command = match config.args.as_deref().map(str::trim) {
            Some(args) if !args.is_empty() => format!(
                "{} run -d --name {} {} {}",
                cli, config.container, args, config.image
            ),
            _ => format!("{} run -d --name {} {}", cli, config.container, config.image),
        };
        let create = Step::new("create", run_command).with_timeout(timeout);

        vec![remove, create]
    }

    /// Union of the credential ids declared by this stage's steps
    pub fn credential_ids(&self) -> BTreeSet<String> {
        self.steps
            .iter()
            .flat_map(|step| step.credentials.iter().cloned())
            .collect()
    }
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            environment: HashMap::new(),
            credentials: HashMap::new(),
            stages: Vec::new(),
            workspace: None,
            shell: "sh".to_string(),
        }
    }

    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        let defaults = StepDefaults {
            timeout_secs: config
                .default_timeout_secs
                .unwrap_or(StepDefaults::default().timeout_secs),
        };

        Pipeline {
            name: config.name.clone(),
            environment: config.environment_as_string_map(),
            credentials: config.credentials.clone(),
            stages: config
                .stages
                .iter()
                .map(|stage| Stage::from_config(stage, &defaults))
                .collect(),
            workspace: config.workspace.clone(),
            shell: config.shell.clone().unwrap_or_else(|| "sh".to_string()),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_credential(mut self, id: impl Into<String>, source: CredentialSource) -> Self {
        self.credentials.insert(id.into(), source);
        self
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Get a stage by name
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Structural checks that hold for programmatic and loaded pipelines
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.stages.is_empty() {
            return Err(PipelineError::Validation(format!(
                "pipeline '{}' has no stages",
                self.name
            )));
        }

        let mut names = HashSet::new();
        for stage in &self.stages {
            if !names.insert(stage.name.as_str()) {
                return Err(PipelineError::Validation(format!(
                    "duplicate stage name '{}'",
                    stage.name
                )));
            }
        }

        Ok(())
    }

    /// Fresh, unsealed environment for a new run
    pub fn environment_store(&self) -> EnvironmentStore {
        EnvironmentStore::from_map(&self.environment)
    }

    /// Vault holding this pipeline's credential declarations
    pub fn vault(&self) -> CredentialVault {
        CredentialVault::from_sources(self.credentials.clone())
    }
}
