// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hierarchical naming directory.
//!
//! A [`NamingDirectory`] maps path segments to [`Bound`] entries. Names are
//! `/`-delimited paths, optionally prefixed with the scheme of the tree's root
//! (`php:env/container/app/appBase`).
//!
//! # Resolution
//!
//! Paths are consumed one token at a time:
//!
//! - a scheme-qualified name given to a non-root directory is delegated to the root
//! - a token bound to a subdirectory with more path remaining recurses into it
//! - a token without a binding is skipped
//! - `bind`/`unbind` act on the final token in the directory where the walk ends
//! - `search` returns (or invokes) the first token that has a binding
//!
//! ```
//! use std::sync::Arc;
//! use appserver_naming::{DirectoryRegistry, NamingDirectory, Value};
//!
//! let root = NamingDirectory::root("php", Arc::new(DirectoryRegistry::new())).unwrap();
//! root.create_subdirectory("env", &[]).unwrap();
//! root.bind("php:env/webappPath", "/var/www/myApp").unwrap();
//!
//! let found = root.search("php:env/webappPath", &[]).unwrap();
//! assert_eq!(found.as_str(), Some("/var/www/myApp"));
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use regex::Regex;
use tracing::{debug, trace};

use crate::error::{NamingError, Result};
use crate::registry::DirectoryRegistry;
use crate::value::{Bound, Value};

/// A node of the naming tree.
pub struct NamingDirectory {
    name: String,
    scheme: Option<String>,
    parent: Weak<NamingDirectory>,
    attributes: DashMap<String, Bound>,
    registry: Arc<DirectoryRegistry>,
}

/// Where a name has to be resolved.
enum Target<'a> {
    /// Scheme-qualified name on a non-root directory.
    Root(Arc<NamingDirectory>),
    /// Path relative to this directory.
    Local(&'a str),
}

impl NamingDirectory {
    /// Create the root of a naming tree and register it.
    pub fn root(scheme: &str, registry: Arc<DirectoryRegistry>) -> Result<Arc<Self>> {
        let root = Arc::new(Self {
            name: String::new(),
            scheme: Some(scheme.to_string()),
            parent: Weak::new(),
            attributes: DashMap::new(),
            registry,
        });
        root.registry.register(&root.identifier()?, &root)?;

        debug!(scheme = %scheme, "Created naming directory root");
        Ok(root)
    }

    /// Create a directory without scheme and parent.
    ///
    /// Such a directory can hold bindings but has no identifier.
    pub fn detached(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            scheme: None,
            parent: Weak::new(),
            attributes: DashMap::new(),
            registry: Arc::new(DirectoryRegistry::new()),
        })
    }

    /// Segment name of this directory (empty for an unnamed root).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scheme of the tree this directory belongs to.
    pub fn scheme(&self) -> Option<String> {
        match self.parent.upgrade() {
            Some(parent) => parent.scheme(),
            None => self.scheme.clone(),
        }
    }

    /// The owning directory, if any.
    pub fn parent(&self) -> Option<Arc<NamingDirectory>> {
        self.parent.upgrade()
    }

    /// The root of the tree this directory belongs to.
    pub fn tree_root(self: &Arc<Self>) -> Arc<NamingDirectory> {
        self.find_root().unwrap_or_else(|| self.clone())
    }

    /// The registry shared by this tree.
    pub fn registry(&self) -> &Arc<DirectoryRegistry> {
        &self.registry
    }

    /// Fully qualified identifier: `scheme:` followed by the path down to this node.
    pub fn identifier(&self) -> Result<String> {
        match self.parent.upgrade() {
            Some(parent) => {
                let parent_id = parent.identifier()?;
                if parent_id.ends_with(':') {
                    Ok(format!("{}{}", parent_id, self.name))
                } else {
                    Ok(format!("{}/{}", parent_id, self.name))
                }
            }
            None => match &self.scheme {
                Some(scheme) => Ok(format!("{}:{}", scheme, self.name)),
                None => Err(NamingError::MissingScheme {
                    name: self.name.clone(),
                }),
            },
        }
    }

    /// Bind a value under `name`.
    pub fn bind(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.bind_bound(name, Bound::Value(value.into()))
    }

    /// Bind a callable that is invoked at search time with `args` followed by
    /// the search arguments.
    pub fn bind_callback<F>(&self, name: &str, callback: F, args: Vec<Value>) -> Result<()>
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.bind_bound(
            name,
            Bound::Callback {
                callback: Arc::new(callback),
                args,
            },
        )
    }

    /// Bind an alias that searches `reference` in this directory.
    pub fn bind_reference(self: &Arc<Self>, name: &str, reference: &str) -> Result<()> {
        let directory = Arc::downgrade(self);
        let reference = reference.to_string();
        let alias = name.to_string();

        self.bind_callback(
            name,
            move |args| match directory.upgrade() {
                Some(directory) => directory.search(&reference, args),
                None => Err(NamingError::Callback {
                    name: alias.clone(),
                    message: format!("referenced directory of {} is gone", reference),
                }),
            },
            Vec::new(),
        )
    }

    /// Bind a prepared entry under `name`.
    pub fn bind_bound(&self, name: &str, bound: Bound) -> Result<()> {
        match self.target(name)? {
            Target::Root(root) => root.bind_bound(name, bound),
            Target::Local(path) => {
                let tokens = self.tokenize(name, path)?;
                self.bind_tokens(name, &tokens, bound)
            }
        }
    }

    /// Remove the binding at `name`.
    pub fn unbind(&self, name: &str) -> Result<()> {
        match self.target(name)? {
            Target::Root(root) => root.unbind(name),
            Target::Local(path) => {
                let tokens = self.tokenize(name, path)?;
                self.unbind_tokens(name, &tokens)
            }
        }
    }

    /// Resolve `name`, invoking callbacks with their bound arguments followed by `args`.
    pub fn search(&self, name: &str, args: &[Value]) -> Result<Value> {
        match self.target(name)? {
            Target::Root(root) => root.search(name, args),
            Target::Local(path) => {
                let tokens = self.tokenize(name, path)?;
                self.search_tokens(name, &tokens, args)
            }
        }
    }

    /// Create and bind a child directory.
    ///
    /// Bindings of this directory whose key fully matches one of the `filters`
    /// (regular expressions) are copied into the child.
    pub fn create_subdirectory(self: &Arc<Self>, name: &str, filters: &[&str]) -> Result<Arc<Self>> {
        if name.is_empty() || name.contains('/') || name.contains(':') {
            return Err(NamingError::InvalidName {
                name: name.to_string(),
                directory: self.describe(),
            });
        }

        let patterns = filters
            .iter()
            .map(|pattern| {
                Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| NamingError::InvalidFilter {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let child = Arc::new(Self {
            name: name.to_string(),
            scheme: None,
            parent: Arc::downgrade(self),
            attributes: DashMap::new(),
            registry: self.registry.clone(),
        });
        let identifier = child.identifier()?;
        self.registry.register(&identifier, &child)?;

        if !patterns.is_empty() {
            let inherited: Vec<(String, Bound)> = self
                .attributes
                .iter()
                .filter(|entry| entry.key() != name)
                .filter(|entry| patterns.iter().any(|p| p.is_match(entry.key())))
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect();
            for (key, bound) in inherited {
                child.attributes.insert(key, bound);
            }
        }

        self.attributes
            .insert(name.to_string(), Bound::Value(Value::Directory(child.clone())));

        debug!(identifier = %identifier, inherited = child.len(), "Created naming subdirectory");
        Ok(child)
    }

    /// Make sure every directory along `path` exists and return the last one.
    pub fn create_subdirectories(self: &Arc<Self>, path: &str) -> Result<Arc<Self>> {
        let path = match self.target(path)? {
            Target::Root(root) => return root.create_subdirectories(path),
            Target::Local(local) => local,
        };

        let mut current = self.clone();
        for token in self.tokenize(path, path)? {
            let existing = current.attributes.get(token).map(|e| e.value().clone());
            current = match existing {
                Some(bound) => match bound.as_directory() {
                    Some(directory) => directory.clone(),
                    None => {
                        return Err(NamingError::NotADirectory {
                            name: path.to_string(),
                            token: token.to_string(),
                            directory: current.describe(),
                        });
                    }
                },
                None => current.create_subdirectory(token, &[])?,
            };
        }
        Ok(current)
    }

    /// Keys bound directly in this directory, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.attributes.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// The entry bound directly under `key`.
    pub fn get(&self, key: &str) -> Option<Bound> {
        self.attributes.get(key).map(|e| e.value().clone())
    }

    /// Check whether `key` is bound directly in this directory.
    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Number of entries bound directly in this directory.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check whether this directory has no entries.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    fn target<'a>(&self, name: &'a str) -> Result<Target<'a>> {
        let Some((scheme, path)) = split_scheme(name) else {
            return Ok(Target::Local(name));
        };

        if let Some(root) = self.find_root() {
            return Ok(Target::Root(root));
        }

        match &self.scheme {
            Some(own) if own == scheme => Ok(Target::Local(path)),
            Some(own) => Err(NamingError::SchemeMismatch {
                name: name.to_string(),
                scheme: own.clone(),
            }),
            None => Err(NamingError::MissingScheme {
                name: self.name.clone(),
            }),
        }
    }

    fn tokenize<'a>(&self, name: &str, path: &'a str) -> Result<Vec<&'a str>> {
        let tokens: Vec<&str> = path.split('/').filter(|t| !t.is_empty()).collect();
        if tokens.is_empty() {
            return Err(NamingError::InvalidName {
                name: name.to_string(),
                directory: self.describe(),
            });
        }
        Ok(tokens)
    }

    fn bind_tokens(&self, name: &str, tokens: &[&str], bound: Bound) -> Result<()> {
        let Some((last, intermediate)) = tokens.split_last() else {
            return Err(NamingError::InvalidName {
                name: name.to_string(),
                directory: self.describe(),
            });
        };

        for (i, token) in intermediate.iter().enumerate() {
            if let Some(existing) = self.get(token) {
                return match existing.as_directory() {
                    Some(directory) => directory.bind_tokens(name, &tokens[i + 1..], bound),
                    None => Err(NamingError::NotADirectory {
                        name: name.to_string(),
                        token: token.to_string(),
                        directory: self.describe(),
                    }),
                };
            }
        }

        let replacement = bound.as_directory().cloned();
        if let Some(previous) = self.attributes.insert(last.to_string(), bound) {
            if let Some(old) = previous.as_directory()
                && !replacement.as_ref().is_some_and(|new| Arc::ptr_eq(new, old))
            {
                old.destroy();
            }
        }

        debug!(name = %name, directory = %self.describe(), key = %last, "Bound name");
        Ok(())
    }

    fn unbind_tokens(&self, name: &str, tokens: &[&str]) -> Result<()> {
        let Some((last, intermediate)) = tokens.split_last() else {
            return Err(NamingError::InvalidName {
                name: name.to_string(),
                directory: self.describe(),
            });
        };

        for (i, token) in intermediate.iter().enumerate() {
            if let Some(existing) = self.get(token) {
                return match existing.as_directory() {
                    Some(directory) => directory.unbind_tokens(name, &tokens[i + 1..]),
                    None => Err(NamingError::NotADirectory {
                        name: name.to_string(),
                        token: token.to_string(),
                        directory: self.describe(),
                    }),
                };
            }
        }

        match self.attributes.remove(*last) {
            Some((_, removed)) => {
                if let Some(directory) = removed.as_directory() {
                    directory.destroy();
                }
                debug!(name = %name, directory = %self.describe(), key = %last, "Unbound name");
                Ok(())
            }
            None => Err(NamingError::NotBound {
                name: name.to_string(),
                directory: self.describe(),
            }),
        }
    }

    fn search_tokens(&self, name: &str, tokens: &[&str], args: &[Value]) -> Result<Value> {
        for (i, token) in tokens.iter().enumerate() {
            let Some(bound) = self.get(token) else {
                continue;
            };

            let remaining = &tokens[i + 1..];
            if let Some(directory) = bound.as_directory()
                && !remaining.is_empty()
            {
                return directory.search_tokens(name, remaining, args);
            }

            trace!(name = %name, directory = %self.describe(), key = %token, "Resolved name");
            return bound.resolve(args);
        }

        Err(NamingError::NotFound {
            name: name.to_string(),
            directory: self.describe(),
        })
    }

    /// Clear this directory and its children and release their identifiers.
    fn destroy(&self) {
        let children: Vec<Arc<NamingDirectory>> = self
            .attributes
            .iter()
            .filter_map(|entry| entry.value().as_directory().cloned())
            .filter(|child| {
                child
                    .parent
                    .upgrade()
                    .is_some_and(|parent| std::ptr::eq(Arc::as_ptr(&parent), self))
            })
            .collect();
        for child in children {
            child.destroy();
        }

        self.attributes.clear();
        if let Ok(identifier) = self.identifier() {
            self.registry.deregister(&identifier);
            debug!(identifier = %identifier, "Destroyed naming directory");
        }
    }

    fn find_root(&self) -> Option<Arc<NamingDirectory>> {
        let mut current = self.parent.upgrade()?;
        while let Some(parent) = current.parent.upgrade() {
            current = parent;
        }
        Some(current)
    }

    fn describe(&self) -> String {
        self.identifier().unwrap_or_else(|_| self.name.clone())
    }
}

impl fmt::Debug for NamingDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamingDirectory")
            .field("identifier", &self.describe())
            .field("keys", &self.keys())
            .finish()
    }
}

/// Split `scheme:path` into its parts; names without a scheme return `None`.
fn split_scheme(name: &str) -> Option<(&str, &str)> {
    let (scheme, path) = name.split_once(':')?;
    if scheme.is_empty() || scheme.contains('/') {
        return None;
    }
    Some((scheme, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Arc<NamingDirectory> {
        NamingDirectory::root("php", Arc::new(DirectoryRegistry::new())).unwrap()
    }

    #[test]
    fn test_split_scheme() {
        assert_eq!(split_scheme("php:env/a"), Some(("php", "env/a")));
        assert_eq!(split_scheme("env/a"), None);
        assert_eq!(split_scheme("env/a:b"), None);
        assert_eq!(split_scheme(":env"), None);
    }

    #[test]
    fn test_identifier_composition() {
        let root = root();
        let env = root.create_subdirectory("env", &[]).unwrap();
        let app = env.create_subdirectory("myApp", &[]).unwrap();

        assert_eq!(root.identifier().unwrap(), "php:");
        assert_eq!(env.identifier().unwrap(), "php:env");
        assert_eq!(app.identifier().unwrap(), "php:env/myApp");
        assert_eq!(app.scheme().as_deref(), Some("php"));
    }

    #[test]
    fn test_detached_directory_has_no_identifier() {
        let detached = NamingDirectory::detached("orphan");

        assert!(matches!(
            detached.identifier(),
            Err(NamingError::MissingScheme { name }) if name == "orphan"
        ));
        detached.bind("key", "value").unwrap();
        assert_eq!(detached.search("key", &[]).unwrap().as_str(), Some("value"));
    }

    #[test]
    fn test_bind_through_non_directory_fails() {
        let root = root();
        root.bind("php:plain", "value").unwrap();

        let err = root.bind("php:plain/nested", "other").unwrap_err();
        assert!(matches!(err, NamingError::NotADirectory { token, .. } if token == "plain"));
    }

    #[test]
    fn test_rebind_overwrites() {
        let root = root();
        root.bind("php:key", "first").unwrap();
        root.bind("php:key", "second").unwrap();

        assert_eq!(root.search("php:key", &[]).unwrap().as_str(), Some("second"));
        assert_eq!(root.len(), 1);
    }

    #[test]
    fn test_missing_intermediate_tokens_are_skipped() {
        let root = root();
        let env = root.create_subdirectory("env", &[]).unwrap();

        root.bind("php:env/unknown/appBase", "/opt/app").unwrap();

        assert!(env.contains("appBase"));
        assert_eq!(
            root.search("php:env/unknown/appBase", &[]).unwrap().as_str(),
            Some("/opt/app")
        );
    }

    #[test]
    fn test_search_returns_directory_without_remaining_path() {
        let root = root();
        let env = root.create_subdirectory("env", &[]).unwrap();

        let found = root.search("php:env", &[]).unwrap();
        assert!(Arc::ptr_eq(found.as_directory().unwrap(), &env));
    }

    #[test]
    fn test_scheme_mismatch() {
        let root = root();
        let err = root.search("java:comp/env", &[]).unwrap_err();
        assert!(matches!(err, NamingError::SchemeMismatch { scheme, .. } if scheme == "php"));
    }

    #[test]
    fn test_empty_path_is_invalid() {
        let root = root();
        assert!(matches!(
            root.bind("php:", "x"),
            Err(NamingError::InvalidName { .. })
        ));
        assert!(matches!(
            root.search("php:///", &[]),
            Err(NamingError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_duplicate_subdirectory_rejected() {
        let root = root();
        root.create_subdirectory("env", &[]).unwrap();

        let err = root.create_subdirectory("env", &[]).unwrap_err();
        assert_eq!(
            err,
            NamingError::DuplicateDirectory {
                identifier: "php:env".to_string()
            }
        );
    }

    #[test]
    fn test_subdirectory_filter_copies_matching_bindings() {
        let root = root();
        root.bind("php:APPSERVER_HOME", "/opt/appserver").unwrap();
        root.bind("php:APPSERVER_USER", "nobody").unwrap();
        root.bind("php:PATH", "/usr/bin").unwrap();

        let env = root.create_subdirectory("env", &["APPSERVER_.*"]).unwrap();

        assert_eq!(env.keys(), vec!["APPSERVER_HOME", "APPSERVER_USER"]);
        assert_eq!(env.search("APPSERVER_USER", &[]).unwrap().as_str(), Some("nobody"));
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let root = root();
        let err = root.create_subdirectory("env", &["("]).unwrap_err();
        assert!(matches!(err, NamingError::InvalidFilter { .. }));
        assert!(!root.contains("env"));
    }

    #[test]
    fn test_unbind_directory_destroys_subtree() {
        let root = root();
        let registry = root.registry().clone();
        let leaf = root.create_subdirectories("php:global/container/app").unwrap();
        leaf.bind("Manager", "instance").unwrap();

        root.unbind("php:global/container").unwrap();

        assert!(leaf.is_empty());
        assert!(!registry.contains("php:global/container"));
        assert!(!registry.contains("php:global/container/app"));
        assert!(registry.contains("php:global"));

        root.create_subdirectories("php:global/container/app").unwrap();
    }

    #[test]
    fn test_create_subdirectories_reuses_existing() {
        let root = root();
        let first = root.create_subdirectories("env/container/app").unwrap();
        let second = root.create_subdirectories("php:env/container/app").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.identifier().unwrap(), "php:env/container/app");
    }

    #[test]
    fn test_reference_resolves_through_directory() {
        let root = root();
        let global = root.create_subdirectory("global", &[]).unwrap();
        global.bind("Target", "resolved").unwrap();

        root.bind_reference("php:alias", "php:global/Target").unwrap();

        assert_eq!(root.search("php:alias", &[]).unwrap().as_str(), Some("resolved"));
    }

    #[test]
    fn test_callback_may_reenter_directory() {
        let root = root();
        let weak = Arc::downgrade(&root);
        root.bind_callback(
            "php:writer",
            move |args| {
                let root = weak.upgrade().unwrap();
                root.bind("php:written", args[0].clone())?;
                Ok(Value::from(true))
            },
            vec![Value::from("payload")],
        )
        .unwrap();

        root.search("php:writer", &[]).unwrap();
        assert_eq!(root.search("php:written", &[]).unwrap().as_str(), Some("payload"));
    }
}
