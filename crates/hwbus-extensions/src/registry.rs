//! Extension registry.
//!
//! Holds at most one live extension per name. Extensions are created once at
//! startup and only dropped at shutdown.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use hwbus_core::{Error, Result};
use tokio::sync::mpsc;
use tracing::info;

use crate::extension::{AnyExtension, Extension, ExtensionCallbacks, ExtensionEvent, ReleaseTask};

/// Keyed store of live extensions. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ExtensionRegistry {
    extensions: Arc<RwLock<HashMap<String, Arc<AnyExtension>>>>,
    events: mpsc::UnboundedSender<ExtensionEvent>,
}

impl ExtensionRegistry {
    /// Create a registry and the receiver of every extension's callbacks.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ExtensionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let registry = Self {
            extensions: Arc::new(RwLock::new(HashMap::new())),
            events,
        };
        (registry, events_rx)
    }

    /// Instantiate the extension `name` through `factory`, wiring its
    /// callbacks to this registry's event stream.
    ///
    /// The name is claimed before the factory runs, so a factory never runs
    /// for a live name.
    ///
    /// # Errors
    /// `ConflictError` for a live name, or whatever the factory returns.
    pub fn register<F>(&self, name: &str, factory: F) -> Result<()>
    where
        F: FnOnce(ExtensionCallbacks) -> Result<AnyExtension>,
    {
        let mut extensions = self
            .extensions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if extensions.contains_key(name) {
            return Err(Error::conflict(name));
        }
        let extension = factory(ExtensionCallbacks::new(name, self.events.clone()))?;
        extensions.insert(name.to_string(), Arc::new(extension));
        info!(extension = name, "Extension loaded");
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<AnyExtension>> {
        self.extensions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Names of live extensions, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .extensions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start releasing everything every extension holds.
    pub fn release_all(&self) -> Vec<ReleaseTask> {
        let extensions: Vec<Arc<AnyExtension>> = self
            .extensions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        extensions
            .iter()
            .flat_map(|extension| {
                extension.release().into_iter().map(|task| ReleaseTask {
                    label: format!("{}/{}", extension.name(), task.label),
                    future: task.future,
                })
            })
            .collect()
    }
}
