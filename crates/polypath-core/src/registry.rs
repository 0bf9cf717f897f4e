//! Scheme registry
//!
//! Maps a URI scheme to the pair of path classes that serve it. The global
//! registry starts with the built-in `memory` scheme; cloud providers are
//! added by `polypath_cloud::install`. Scheme-less paths never consult the
//! registry.

use crate::class::ClassPair;
use crate::config::Config;
use crate::memory::MemoryClient;
use crate::object::ObjectBackend;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::debug;

/// Scheme of the built-in in-memory store
pub const MEMORY_SCHEME: &str = "memory";

/// Blocking and suspend classes registered for one scheme
pub type SchemeEntry = ClassPair;

/// Scheme to class-pair mapping, internally synchronized
#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<BTreeMap<String, SchemeEntry>>,
}

/// Classes of the built-in `memory://` scheme, backed by the shared store
pub fn memory_classes() -> SchemeEntry {
    memory_classes_with_config(&Config::default())
}

pub fn memory_classes_with_config(config: &Config) -> SchemeEntry {
    let config = config.clone();
    ClassPair::from_async("MemoryPath", "AsyncMemoryPath", move || {
        Ok(ObjectBackend::from_config(
            MEMORY_SCHEME,
            Arc::new(MemoryClient::shared()),
            &config,
        ))
    })
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in schemes
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(MEMORY_SCHEME, memory_classes());
        registry
    }

    /// The process-wide registry used by the router
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::with_builtins)
    }

    fn normalize(scheme: &str) -> String {
        scheme.trim_end_matches("://").to_ascii_lowercase()
    }

    /// Register (or replace) the classes for `scheme`
    pub fn register(&self, scheme: &str, entry: SchemeEntry) {
        let scheme = Self::normalize(scheme);
        debug!(
            "registering scheme {} -> ({}, {})",
            scheme,
            entry.blocking.name(),
            entry.suspend.name()
        );
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scheme, entry);
    }

    /// Remove `scheme`, returning what was registered
    pub fn unregister(&self, scheme: &str) -> Option<SchemeEntry> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&Self::normalize(scheme))
    }

    /// Replace the classes for `scheme`, returning the previous pair
    pub fn swap(&self, scheme: &str, entry: SchemeEntry) -> Option<SchemeEntry> {
        let scheme = Self::normalize(scheme);
        debug!("swapping scheme {}", scheme);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scheme, entry)
    }

    pub fn get(&self, scheme: &str) -> Option<SchemeEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&Self::normalize(scheme))
            .cloned()
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.get(scheme).is_some()
    }

    /// Registered schemes, sorted
    pub fn schemes(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Forget every scheme
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Copy of the current mapping
    pub fn snapshot(&self) -> BTreeMap<String, SchemeEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Put back a mapping taken with [`Registry::snapshot`]
    pub fn restore(&self, snapshot: BTreeMap<String, SchemeEntry>) {
        *self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    /// Reset to the built-in schemes only
    pub fn restore_builtins(&self) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        entries.insert(MEMORY_SCHEME.to_string(), memory_classes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins() {
        let registry = Registry::with_builtins();
        assert_eq!(registry.schemes(), vec!["memory"]);
        let entry = registry.get("MEMORY").unwrap();
        assert_eq!(entry.blocking.name(), "MemoryPath");
        assert_eq!(entry.suspend.name(), "AsyncMemoryPath");
    }

    #[test]
    fn test_swap_returns_previous() {
        let registry = Registry::with_builtins();
        let replacement =
            ClassPair::from_async("MockS3Path", "AsyncMockS3Path", || {
                Ok(ObjectBackend::new("s3", Arc::new(MemoryClient::new())))
            });
        assert!(registry.swap("s3", replacement.clone()).is_none());
        let previous = registry.swap("s3", memory_classes()).unwrap();
        assert_eq!(previous.blocking.name(), "MockS3Path");
        assert_eq!(registry.schemes(), vec!["memory", "s3"]);
    }

    #[test]
    fn test_clear_and_restore() {
        let registry = Registry::with_builtins();
        let saved = registry.snapshot();
        registry.clear();
        assert!(registry.schemes().is_empty());
        registry.restore(saved);
        assert!(registry.contains("memory"));

        registry.unregister("memory");
        registry.restore_builtins();
        assert_eq!(registry.schemes(), vec!["memory"]);
    }
}
