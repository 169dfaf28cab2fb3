// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Component traits.
//!
//! Applications are assembled from four kinds of components. Each kind is a
//! trait object registered under a name on the [`Application`].

use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::application::Application;

/// Loads code for an application. Registered in reverse injection order.
pub trait ClassLoader: Send + Sync {
    /// Register the loader with the application.
    fn register(&self, application: &Application) -> anyhow::Result<()>;
}

/// A long-lived application service (bean container, session manager, ...).
pub trait Manager: Send + Sync {
    /// Initialize the manager before the application goes live.
    fn initialize(&self, application: &Application) -> anyhow::Result<()>;

    /// Stop the manager. Runs on a dedicated thread during shutdown.
    fn stop(&self) -> anyhow::Result<()>;
}

/// Runs provisioning steps (schema setup, fixtures) when the container enables it.
pub trait Provisioner: Send + Sync {
    /// Provision the application.
    fn provision(&self, application: &Application) -> anyhow::Result<()>;
}

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error
    Error,
    /// Warning
    Warn,
    /// Informational
    Info,
    /// Debug
    Debug,
    /// Trace
    Trace,
}

/// Application log channel.
pub trait Logger: Send + Sync {
    /// Write a message.
    fn log(&self, level: LogLevel, message: &str);

    /// Write an info message.
    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Write an error message.
    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// Logger forwarding to `tracing` with the channel name as a field.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    channel: String,
}

impl TracingLogger {
    /// Create a logger for `channel`.
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }

    /// The channel name.
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        let channel = self.channel.as_str();
        match level {
            LogLevel::Error => tracing::error!(channel, "{}", message),
            LogLevel::Warn => tracing::warn!(channel, "{}", message),
            LogLevel::Info => tracing::info!(channel, "{}", message),
            LogLevel::Debug => tracing::debug!(channel, "{}", message),
            LogLevel::Trace => tracing::trace!(channel, "{}", message),
        }
    }
}

/// Insertion-ordered name → component map.
pub(crate) struct ComponentMap<T: ?Sized> {
    entries: RwLock<IndexMap<String, Arc<T>>>,
}

impl<T: ?Sized> ComponentMap<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
        }
    }

    /// Insert or replace; a replaced entry keeps its position.
    pub(crate) fn insert(&self, name: &str, component: Arc<T>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), component);
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<T>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub(crate) fn entries(&self) -> Vec<(String, Arc<T>)> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, component)| (name.clone(), component.clone()))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
