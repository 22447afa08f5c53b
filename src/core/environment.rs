//! Environment store - immutable key/value configuration for a run

use crate::core::error::PipelineError;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Key/value configuration visible to every stage of a run
///
/// Values can be set until the store is sealed. The engine seals the store
/// before the first stage starts, so every stage observes the same bindings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnvironmentStore {
    /// Bound variables, ordered for stable output
    variables: BTreeMap<String, String>,

    /// Set once the run has started
    #[serde(skip)]
    sealed: bool,
}

impl EnvironmentStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unsealed store from an existing map
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        Self {
            variables: map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            sealed: false,
        }
    }

    /// Bind a variable, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<(), PipelineError> {
        let key = key.into();
        if self.sealed {
            return Err(PipelineError::EnvironmentSealed(key));
        }
        self.variables.insert(key, value.into());
        Ok(())
    }

    /// Look up a variable
    pub fn get(&self, key: &str) -> Result<&str, PipelineError> {
        self.variables
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| PipelineError::UnboundVariable(key.to_string()))
    }

    /// Whether a key is bound
    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    /// Forbid further mutation
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
