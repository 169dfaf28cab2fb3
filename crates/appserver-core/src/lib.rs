// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Appserver Core - Application Lifecycle Management
//!
//! This crate hosts deployed applications. Each application runs on its own
//! worker thread, owns its class loaders, managers, provisioners and loggers,
//! and publishes them in the shared naming tree of `appserver-naming`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        AppServerRuntime                          │
//! │  ┌────────────────────┐  ┌──────────────────────┐  ┌──────────┐  │
//! │  │ ApplicationFactory │─▶│ ApplicationContainer │─▶│ worker   │  │
//! │  │ ComponentRegistry  │  │  (DashMap by name)   │  │ threads  │  │
//! │  └────────────────────┘  └──────────────────────┘  └────┬─────┘  │
//! └─────────────────────────────────────────────────────────┼────────┘
//!                                                           │ bind/search
//!                                                           ▼
//!                                         ┌────────────────────────────┐
//!                                         │ NamingDirectory (php:)     │
//!                                         │ env/ global/ services/     │
//!                                         └────────────────────────────┘
//! ```
//!
//! # Application State Machine
//!
//! ```text
//!   WAITING_FOR_INITIALIZATION
//!              │ class loaders, managers, provisioners
//!              ▼
//!   INITIALIZATION_SUCCESSFUL ◀── is_connected()
//!              │ stop()
//!              ▼
//!            HALT
//!              │ one ManagerShutdownThread per manager, all joined
//!              ▼
//!          SHUTDOWN ──▶ unload()   (terminal, connect() is refused)
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `APPSERVER_CONTAINER_NAME` | No | `combined-appserver` | Container name |
//! | `APPSERVER_RUNLEVEL` | No | `application` | Container runlevel |
//! | `APPSERVER_APP_BASE` | No | `webapps` | Directory holding application folders |
//! | `APPSERVER_TMP_DIR` | No | `var/tmp` | Directory for temporary folders |
//! | `APPSERVER_USER` | No | `nobody` | Owner user |
//! | `APPSERVER_GROUP` | No | `nobody` | Owner group |
//! | `APPSERVER_UMASK` | No | `0002` | Octal file creation mask |
//! | `APPSERVER_PROVISIONING` | No | `false` | Run provisioners on startup |
//! | `APPSERVER_APP_TTL_MS` | No | `100` | Worker idle tick in milliseconds |
//! | `APPSERVER_APPLICATIONS` | No | - | JSON file with application descriptors |
//!
//! # Modules
//!
//! - [`application`]: The deployed application and its worker thread
//! - [`components`]: Class loader, manager, provisioner and logger traits
//! - [`config`]: Configuration from environment variables
//! - [`container`]: The container trait and in-process container
//! - [`descriptor`]: Application descriptors
//! - [`error`]: Error types
//! - [`factory`]: Application factory and component registry
//! - [`runtime`]: Embeddable runtime
//! - [`services`]: Filesystem container services
//! - [`shutdown`]: Per-manager shutdown threads
//! - [`state`]: Application states

#![deny(missing_docs)]

/// Deployed applications.
pub mod application;

/// Component traits.
pub mod components;

/// Configuration loaded from environment variables.
pub mod config;

/// Container trait and in-process container.
pub mod container;

/// Application descriptors.
pub mod descriptor;

/// Error types for appserver operations.
pub mod error;

/// Application factory.
pub mod factory;

/// Embeddable runtime for appserver.
pub mod runtime;

/// Container services.
pub mod services;

/// Manager shutdown threads.
pub mod shutdown;

/// Application lifecycle states.
pub mod state;

pub use application::{Application, ApplicationBuilder, ApplicationInfo};
pub use components::{ClassLoader, LogLevel, Logger, Manager, Provisioner, TracingLogger};
pub use config::{Config, ConfigError};
pub use container::{ApplicationContainer, Container, ContainerSettings};
pub use descriptor::{ApplicationContext, ComponentConfig};
pub use error::{Error, Result};
pub use factory::{ApplicationFactory, ComponentFactory, ComponentRegistry};
pub use runtime::AppServerRuntime;
pub use services::{ContainerServices, FilesystemServices};
pub use shutdown::ManagerShutdownThread;
pub use state::{ApplicationState, StateError};
