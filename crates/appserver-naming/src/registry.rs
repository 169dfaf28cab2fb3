// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Directory registry
//!
//! Tracks the identifiers of every live directory of one naming tree so the same
//! identifier can never be registered twice. One registry is shared by all
//! directories of a tree and is handed down on subdirectory creation.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::directory::NamingDirectory;
use crate::error::{NamingError, Result};

/// Registry of live naming directories keyed by identifier.
#[derive(Debug, Default)]
pub struct DirectoryRegistry {
    directories: DashMap<String, Weak<NamingDirectory>>,
}

impl DirectoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a directory under its identifier.
    ///
    /// Entries whose directory has been dropped are replaced.
    pub fn register(&self, identifier: &str, directory: &Arc<NamingDirectory>) -> Result<()> {
        match self.directories.entry(identifier.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().upgrade().is_some() {
                    return Err(NamingError::DuplicateDirectory {
                        identifier: identifier.to_string(),
                    });
                }
                entry.insert(Arc::downgrade(directory));
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::downgrade(directory));
            }
        }

        tracing::trace!(identifier = %identifier, "Registered naming directory");
        Ok(())
    }

    /// Remove an identifier.
    pub fn deregister(&self, identifier: &str) {
        if self.directories.remove(identifier).is_some() {
            tracing::trace!(identifier = %identifier, "Deregistered naming directory");
        }
    }

    /// Look up a live directory by identifier.
    pub fn get(&self, identifier: &str) -> Option<Arc<NamingDirectory>> {
        self.directories.get(identifier).and_then(|d| d.upgrade())
    }

    /// Check whether a live directory is registered under `identifier`.
    pub fn contains(&self, identifier: &str) -> bool {
        self.get(identifier).is_some()
    }

    /// Identifiers of all live directories, sorted.
    pub fn identifiers(&self) -> Vec<String> {
        let mut identifiers: Vec<String> = self
            .directories
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .map(|entry| entry.key().clone())
            .collect();
        identifiers.sort();
        identifiers
    }

    /// Number of registered identifiers.
    pub fn len(&self) -> usize {
        self.directories.len()
    }

    /// Check whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_rejects_live_duplicate() {
        let registry = Arc::new(DirectoryRegistry::new());
        let root = NamingDirectory::root("php", registry.clone()).unwrap();

        let err = registry.register("php:", &root).unwrap_err();
        assert_eq!(
            err,
            NamingError::DuplicateDirectory {
                identifier: "php:".to_string()
            }
        );
    }

    #[test]
    fn test_dropped_directory_can_be_replaced() {
        let registry = Arc::new(DirectoryRegistry::new());
        {
            let _root = NamingDirectory::root("php", registry.clone()).unwrap();
            assert!(registry.contains("php:"));
        }
        assert!(!registry.contains("php:"));

        let root = NamingDirectory::root("php", registry.clone()).unwrap();
        assert!(Arc::ptr_eq(&registry.get("php:").unwrap(), &root));
    }
}
