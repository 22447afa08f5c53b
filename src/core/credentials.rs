//! Credential vault - scoped, exclusive access to secret values
//!
//! Secrets are resolved from their declared source only when a scope is
//! acquired, live inside the [`CredentialScope`] and are overwritten when the
//! scope is dropped. The vault remembers which ids are currently held so two
//! live scopes can never share a credential.

use crate::core::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// Replacement text for redacted secrets
pub const REDACTED: &str = "****";

/// Where a credential value comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    /// Process environment variable, read at scope entry
    Env(String),
    /// File whose trimmed content is the secret
    File(PathBuf),
    /// Literal value (local runs and tests)
    Value(String),
}

impl CredentialSource {
    fn resolve(&self, id: &str) -> Result<Secret, PipelineError> {
        let unavailable = |reason: String| PipelineError::CredentialUnavailable {
            id: id.to_string(),
            reason,
        };

        match self {
            CredentialSource::Env(var) => std::env::var(var)
                .map(Secret::new)
                .map_err(|_| unavailable(format!("environment variable {} is not set", var))),
            CredentialSource::File(path) => std::fs::read_to_string(path)
                .map(|content| Secret::new(content.trim_end().to_string()))
                .map_err(|e| unavailable(format!("cannot read {}: {}", path.display(), e))),
            CredentialSource::Value(value) => Ok(Secret::new(value.clone())),
        }
    }
}

/// A secret value that is erased when dropped and never printed
pub struct Secret(String);

impl Secret {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Borrow the plain value
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Overwrite the secret bytes and leave an empty value behind
    pub fn erase(&mut self) {
        wipe(&mut self.0);
    }
}

/// Zero a string's bytes and leave it empty
pub(crate) fn wipe(value: &mut String) {
    let mut bytes = std::mem::take(value).into_bytes();
    bytes.iter_mut().for_each(|b| *b = 0);
    std::hint::black_box(&bytes);
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.erase();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", REDACTED)
    }
}

/// Declared credentials and the ids currently held by live scopes
#[derive(Debug, Default)]
pub struct CredentialVault {
    sources: HashMap<String, CredentialSource>,
    held: Mutex<HashSet<String>>,
}

impl CredentialVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a vault from credential declarations
    pub fn from_sources(sources: HashMap<String, CredentialSource>) -> Self {
        Self {
            sources,
            held: Mutex::new(HashSet::new()),
        }
    }

    /// Declare a credential
    pub fn declare(&mut self, id: impl Into<String>, source: CredentialSource) {
        self.sources.insert(id.into(), source);
    }

    pub fn is_declared(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    /// Whether a live scope currently holds this id
    pub fn is_held(&self, id: &str) -> bool {
        self.held_ids().contains(id)
    }

    fn held_ids(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolve the given ids into an exclusive scope
    ///
    /// Nothing is held if any id fails to resolve.
    pub fn acquire<I, S>(&self, ids: I) -> Result<CredentialScope<'_>, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: BTreeSet<String> = ids.into_iter().map(|s| s.as_ref().to_string()).collect();

        if let Some(missing) = ids.iter().find(|id| !self.sources.contains_key(*id)) {
            return Err(PipelineError::CredentialNotFound(missing.clone()));
        }

        {
            let mut held = self.held_ids();
            if let Some(busy) = ids.iter().find(|id| held.contains(*id)) {
                return Err(PipelineError::CredentialInUse(busy.clone()));
            }
            held.extend(ids.iter().cloned());
        }

        // From here on the scope owns the ids and releases them on drop,
        // including when a later source fails to resolve.
        let mut scope = CredentialScope {
            vault: self,
            secrets: HashMap::new(),
            ids: ids.clone(),
        };

        for id in &ids {
            let secret = self.sources[id].resolve(id)?;
            scope.secrets.insert(id.clone(), secret);
        }

        debug!("Acquired credential scope for {} id(s)", ids.len());
        Ok(scope)
    }

    /// Run `body` with the resolved credentials, releasing them on every exit path
    pub fn with_scope<I, S, T, F>(&self, ids: I, body: F) -> Result<T, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnOnce(&CredentialScope<'_>) -> T,
    {
        let scope = self.acquire(ids)?;
        Ok(body(&scope))
    }

    fn release(&self, ids: &BTreeSet<String>) {
        let mut held = self.held_ids();
        for id in ids {
            held.remove(id);
        }
    }
}

/// Read-only view of resolved secrets, valid until dropped
pub struct CredentialScope<'v> {
    vault: &'v CredentialVault,
    secrets: HashMap<String, Secret>,
    ids: BTreeSet<String>,
}

impl CredentialScope<'_> {
    /// Look up a secret held by this scope
    pub fn get(&self, id: &str) -> Option<&str> {
        self.secrets.get(id).map(Secret::expose)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.secrets.contains_key(id)
    }

    /// Ids held by this scope
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Replace every secret value occurring in `text`
    pub fn redact(&self, text: &str) -> String {
        // Longest first so a secret containing another is fully masked.
        let mut values: Vec<&str> = self
            .secrets
            .values()
            .map(Secret::expose)
            .filter(|v| !v.is_empty())
            .collect();
        values.sort_by_key(|v| std::cmp::Reverse(v.len()));

        values
            .into_iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret, REDACTED))
    }
}

impl Drop for CredentialScope<'_> {
    fn drop(&mut self) {
        for secret in self.secrets.values_mut() {
            secret.erase();
        }
        self.secrets.clear();
        self.vault.release(&self.ids);
        debug!("Released credential scope for {} id(s)", self.ids.len());
    }
}

impl fmt::Debug for CredentialScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialScope").field("ids", &self.ids).finish()
    }
}
