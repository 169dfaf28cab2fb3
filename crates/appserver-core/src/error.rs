// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for appserver-core.

use std::path::PathBuf;

use thiserror::Error;

/// Appserver errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Naming directory operation failed.
    #[error("Naming error: {0}")]
    Naming(#[from] appserver_naming::NamingError),

    /// Application state lookup failed.
    #[error("State error: {0}")]
    State(#[from] crate::state::StateError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A class loader, manager, provisioner or logger failed.
    #[error("{kind} {name} failed: {source:#}")]
    Component {
        /// Component kind (`manager`, `provisioner`, ...).
        kind: &'static str,
        /// Component name.
        name: String,
        /// The underlying failure.
        #[source]
        source: anyhow::Error,
    },

    /// The application folder has neither `WEB-INF` nor `META-INF`.
    #[error("Application {application} at {} has no WEB-INF or META-INF folder", path.display())]
    InvalidLayout {
        /// Application name.
        application: String,
        /// The application folder.
        path: PathBuf,
    },

    /// A descriptor references a type or factory that is not registered.
    #[error("Unknown {kind} type '{type_name}'")]
    UnknownComponent {
        /// Component kind.
        kind: &'static str,
        /// The unresolved type or factory name.
        type_name: String,
    },

    /// `stop` was called on an application that was never connected.
    #[error("Application {0} is not connected")]
    NotConnected(String),

    /// The worker thread exited without reaching SHUTDOWN.
    #[error("Worker thread of application {0} terminated without shutting down")]
    WorkerTerminated(String),

    /// `connect` was called on an application that already left
    /// WAITING_FOR_INITIALIZATION.
    #[error("Application {application} can't be connected in state {state}")]
    AlreadyStopped {
        /// Application name.
        application: String,
        /// The state the application is in.
        state: crate::state::ApplicationState,
    },
}

/// Result type using appserver Error.
pub type Result<T> = std::result::Result<T, Error>;
