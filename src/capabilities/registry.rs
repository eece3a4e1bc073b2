//! Capability Registry — the set of named capabilities a planner may use.
//!
//! Names are unique: a name, once registered, is never removed or redefined.
//! Each entry may carry a [`CapabilityHandler`], making the registry the
//! dispatch table the planner calls through.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::capability::{Capability, CapabilityHandler};
use crate::utilities::errors::BoxError;

/// Errors raised by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A capability with this name is already registered.
    #[error("capability '{name}' is already registered")]
    DuplicateName { name: String },

    /// No capability with this name exists.
    #[error("capability '{name}' not found")]
    NotFound { name: String },

    /// The capability exists but nothing executes it.
    #[error("capability '{name}' has no execution backend")]
    NoBackend { name: String },

    /// The backend failed.
    #[error("capability '{name}' failed: {source}")]
    Invocation {
        name: String,
        #[source]
        source: BoxError,
    },
}

struct RegistryEntry {
    capability: Capability,
    handler: Option<Arc<dyn CapabilityHandler>>,
}

/// Name-keyed capability set with per-capability dispatch.
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl CapabilityRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability without an execution backend.
    pub fn register(&mut self, capability: Capability) -> Result<(), RegistryError> {
        self.insert(capability, None)
    }

    /// Register a capability together with the handler that executes it.
    pub fn register_with_handler(
        &mut self,
        capability: Capability,
        handler: Arc<dyn CapabilityHandler>,
    ) -> Result<(), RegistryError> {
        self.insert(capability, Some(handler))
    }

    fn insert(
        &mut self,
        capability: Capability,
        handler: Option<Arc<dyn CapabilityHandler>>,
    ) -> Result<(), RegistryError> {
        if self.entries.contains_key(&capability.name) {
            return Err(RegistryError::DuplicateName {
                name: capability.name,
            });
        }
        log::debug!(
            "Registered capability '{}' (backend: {})",
            capability.name,
            handler.is_some()
        );
        self.entries.insert(
            capability.name.clone(),
            RegistryEntry {
                capability,
                handler,
            },
        );
        Ok(())
    }

    /// Whether a capability with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Look up a capability by name.
    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.entries.get(name).map(|e| &e.capability)
    }

    /// Whether the named capability has an execution backend.
    pub fn has_backend(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .map_or(false, |e| e.handler.is_some())
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// All registered capabilities, sorted by name.
    pub fn snapshot(&self) -> Vec<Capability> {
        let mut caps: Vec<Capability> = self
            .entries
            .values()
            .map(|e| e.capability.clone())
            .collect();
        caps.sort_by(|a, b| a.name.cmp(&b.name));
        caps
    }

    /// Execute a capability by name.
    pub async fn invoke(&self, name: &str, input: Value) -> Result<Value, RegistryError> {
        let entry = self.entries.get(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
        })?;
        let handler = entry.handler.as_ref().ok_or_else(|| RegistryError::NoBackend {
            name: name.to_string(),
        })?;
        handler
            .invoke(input)
            .await
            .map_err(|source| RegistryError::Invocation {
                name: name.to_string(),
                source,
            })
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("names", &self.names())
            .finish()
    }
}
