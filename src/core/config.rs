//! Pipeline configuration from YAML

use crate::core::{credentials::CredentialSource, step::Step, Pipeline};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Pipeline version (optional)
    #[serde(default)]
    pub version: Option<String>,

    /// Environment bindings visible to every stage
    #[serde(default)]
    environment: HashMap<String, Value>,

    /// Credential declarations (id -> source), written as `{ env: VAR }`,
    /// `{ file: PATH }` or `{ value: TEXT }`
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub credentials: HashMap<String, CredentialSource>,

    /// Pipeline stages, in execution order
    pub stages: Vec<StageConfig>,

    /// Default timeout for steps (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Working directory for every step
    #[serde(default)]
    pub workspace: Option<PathBuf>,

    /// Shell used to run step commands
    #[serde(default)]
    pub shell: Option<String>,
}

/// Stage configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Stage name, unique within the pipeline
    pub name: String,

    /// Failures inside the stage do not abort the pipeline
    #[serde(default)]
    pub best_effort: bool,

    /// Ordered steps
    #[serde(default)]
    pub steps: Vec<StepConfig>,

    /// Remove-then-run container shorthand, appended after `steps`
    #[serde(default)]
    pub redeploy: Option<RedeployConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Optional step name (defaults to `step-N`)
    #[serde(default)]
    pub name: Option<String>,

    /// Command template
    pub run: String,

    /// Environment keys required beyond the template's placeholders
    #[serde(default)]
    pub env: Vec<String>,

    /// Credential ids this step reads
    #[serde(default)]
    pub credentials: Vec<String>,

    /// A failure is recorded but does not stop the stage
    #[serde(default)]
    pub best_effort: bool,

    /// Timeout for this step (overrides global)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Idempotent container redeploy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeployConfig {
    /// Name of the running instance to replace
    pub container: String,

    /// Image to start
    pub image: String,

    /// Extra `run` arguments (ports, volumes, ...)
    #[serde(default)]
    pub args: Option<String>,

    /// Container CLI (defaults to `docker`)
    #[serde(default)]
    pub cli: Option<String>,
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig =
            serde_yaml::from_str(yaml).context("Failed to parse pipeline YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            anyhow::bail!("Pipeline '{}' has no stages", self.name);
        }

        // Check that all stage names are unique
        let mut seen_names = HashSet::new();
        for stage in &self.stages {
            if stage.name.trim().is_empty() {
                anyhow::bail!("Stage names cannot be empty");
            }
            if !seen_names.insert(&stage.name) {
                anyhow::bail!("Duplicate stage name: {}", stage.name);
            }
            if stage.steps.is_empty() && stage.redeploy.is_none() {
                anyhow::bail!("Stage '{}' has no steps", stage.name);
            }
        }

        if self.default_timeout_secs == Some(0) {
            anyhow::bail!("default_timeout_secs must be positive");
        }

        for stage in &self.stages {
            for (index, step) in stage.steps.iter().enumerate() {
                let label = step
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("step-{}", index + 1));

                if step.run.trim().is_empty() {
                    anyhow::bail!("Step '{}' in stage '{}' has an empty command", label, stage.name);
                }

                if step.timeout_secs == Some(0) {
                    anyhow::bail!(
                        "Step '{}' in stage '{}' has a zero timeout",
                        label,
                        stage.name
                    );
                }

                // Check that credentials reference declared ids
                for id in &step.credentials {
                    if !self.credentials.contains_key(id) {
                        anyhow::bail!(
                            "Step '{}' in stage '{}' uses undeclared credential '{}'",
                            label,
                            stage.name,
                            id
                        );
                    }
                }

                // A credential placeholder is only readable by steps that declare it
                for key in self.credential_placeholders(&step.run) {
                    if !step.credentials.contains(&key) {
                        anyhow::bail!(
                            "Step '{}' in stage '{}' references credential '{}' without declaring it",
                            label,
                            stage.name,
                            key
                        );
                    }
                }
            }

            if let Some(redeploy) = &stage.redeploy {
                if redeploy.container.trim().is_empty() || redeploy.image.trim().is_empty() {
                    anyhow::bail!(
                        "Stage '{}' redeploy needs both a container and an image",
                        stage.name
                    );
                }

                // Generated redeploy steps declare no credentials
                let fields = [Some(&redeploy.container), Some(&redeploy.image), redeploy.args.as_ref()];
                for field in fields.into_iter().flatten() {
                    if let Some(key) = self.credential_placeholders(field).into_iter().next() {
                        anyhow::bail!(
                            "Stage '{}' redeploy references credential '{}'; redeploy cannot read credentials",
                            stage.name,
                            key
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Declared credential ids referenced as `${id}` in a command template
    fn credential_placeholders(&self, template: &str) -> Vec<String> {
        Step::new("template", template)
            .placeholders()
            .into_iter()
            .filter(|key| self.credentials.contains_key(key))
            .collect()
    }

    /// Get environment bindings as a string map
    ///
    /// Scalars are converted to their plain text form so `PORT: 8080` binds `"8080"`.
    pub fn environment_as_string_map(&self) -> HashMap<String, String> {
        self.environment
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    Value::Null => String::new(),
                    other => serde_yaml::to_string(other)
                        .unwrap_or_default()
                        .trim_end()
                        .to_string(),
                };
                (key.clone(), rendered)
            })
            .collect()
    }

    /// Number of environment bindings
    pub fn environment_len(&self) -> usize {
        self.environment.len()
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline::from_config(self)
    }
}
