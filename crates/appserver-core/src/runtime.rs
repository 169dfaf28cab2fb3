// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for appserver.
//!
//! This module provides [`AppServerRuntime`] which allows embedding the
//! application container into an existing program instead of running the
//! `appserver` binary.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use appserver_core::{AppServerRuntime, ApplicationContext, ComponentRegistry, ContainerSettings};
//!
//! fn main() -> anyhow::Result<()> {
//!     let runtime = AppServerRuntime::builder()
//!         .container(ContainerSettings::default())
//!         .application(ApplicationContext { name: "example".into(), ..Default::default() })
//!         .component_registry(Arc::new(ComponentRegistry::with_defaults()))
//!         .build()?
//!         .start()?;
//!
//!     runtime.wait_until_connected(Duration::from_secs(5));
//!
//!     // ... serve requests ...
//!
//!     runtime.shutdown()?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use appserver_naming::{DirectoryRegistry, NamingDirectory};
use tracing::{error, info, warn};

use crate::application::{Application, DEFAULT_TICK};
use crate::container::{ApplicationContainer, Container, ContainerSettings};
use crate::descriptor::ApplicationContext;
use crate::factory::{ApplicationFactory, ComponentRegistry};
use crate::services::{ContainerServices, FilesystemServices};

const CONNECT_POLL: Duration = Duration::from_millis(10);

/// Builder for creating an [`AppServerRuntime`].
pub struct AppServerRuntimeBuilder {
    container: ContainerSettings,
    applications: Vec<ApplicationContext>,
    registry: Option<Arc<ComponentRegistry>>,
    services: Option<Arc<dyn ContainerServices>>,
    application_tick: Duration,
    scheme: String,
}

impl Default for AppServerRuntimeBuilder {
    fn default() -> Self {
        Self {
            container: ContainerSettings::default(),
            applications: Vec::new(),
            registry: None,
            services: None,
            application_tick: DEFAULT_TICK,
            scheme: "php".to_string(),
        }
    }
}

impl AppServerRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the container settings.
    ///
    /// Default: [`ContainerSettings::default()`]
    pub fn container(mut self, settings: ContainerSettings) -> Self {
        self.container = settings;
        self
    }

    /// Add an application to deploy.
    pub fn application(mut self, context: ApplicationContext) -> Self {
        self.applications.push(context);
        self
    }

    /// Add several applications to deploy.
    pub fn applications(mut self, contexts: impl IntoIterator<Item = ApplicationContext>) -> Self {
        self.applications.extend(contexts);
        self
    }

    /// Set the component registry.
    ///
    /// Default: [`ComponentRegistry::with_defaults()`]
    pub fn component_registry(mut self, registry: Arc<ComponentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the container services.
    ///
    /// Default: [`FilesystemServices`]
    pub fn services(mut self, services: Arc<dyn ContainerServices>) -> Self {
        self.services = Some(services);
        self
    }

    /// Set the idle tick of application worker threads.
    ///
    /// Default: 100 milliseconds
    pub fn application_tick(mut self, tick: Duration) -> Self {
        self.application_tick = tick;
        self
    }

    /// Set the naming scheme.
    ///
    /// Default: `php`
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if the settings are inconsistent.
    pub fn build(self) -> Result<AppServerRuntimeConfig> {
        if self.container.name.is_empty() {
            anyhow::bail!("container name is required");
        }
        if self.scheme.is_empty() || self.scheme.contains([':', '/']) {
            anyhow::bail!("invalid naming scheme '{}'", self.scheme);
        }
        if let Some(context) = self.applications.iter().find(|c| c.name.is_empty()) {
            anyhow::bail!("application without name: {:?}", context);
        }

        Ok(AppServerRuntimeConfig {
            container: self.container,
            applications: self.applications,
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(ComponentRegistry::with_defaults())),
            services: self
                .services
                .unwrap_or_else(|| Arc::new(FilesystemServices::new())),
            application_tick: self.application_tick,
            scheme: self.scheme,
        })
    }
}

/// Configuration for an [`AppServerRuntime`].
pub struct AppServerRuntimeConfig {
    container: ContainerSettings,
    applications: Vec<ApplicationContext>,
    registry: Arc<ComponentRegistry>,
    services: Arc<dyn ContainerServices>,
    application_tick: Duration,
    scheme: String,
}

impl AppServerRuntimeConfig {
    /// Start the runtime: create the naming tree and container, then deploy and
    /// connect every application.
    ///
    /// Applications that fail to deploy are logged and skipped.
    pub fn start(self) -> Result<AppServerRuntime> {
        let directories = Arc::new(DirectoryRegistry::new());
        let naming_directory = NamingDirectory::root(&self.scheme, directories.clone())?;

        let container = Arc::new(ApplicationContainer::new(
            self.container,
            naming_directory.clone(),
        ));
        container.register()?;

        let factory = ApplicationFactory::new(self.registry, self.services)
            .with_tick(self.application_tick);

        for context in &self.applications {
            let application = match factory.visit(container.as_ref(), context) {
                Ok(application) => application,
                Err(e) => {
                    error!(application = %context.name, error = %e, "Failed to deploy application");
                    continue;
                }
            };
            if let Err(e) = application.connect() {
                error!(application = %context.name, error = %e, "Failed to connect application");
            }
        }

        info!(
            container = %container.name(),
            applications = container.applications().len(),
            "AppServerRuntime started"
        );

        Ok(AppServerRuntime {
            container,
            naming_directory,
            directories,
        })
    }
}

/// A running application container.
///
/// Call [`shutdown`](Self::shutdown) for graceful termination.
pub struct AppServerRuntime {
    container: Arc<ApplicationContainer>,
    naming_directory: Arc<NamingDirectory>,
    directories: Arc<DirectoryRegistry>,
}

impl AppServerRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> AppServerRuntimeBuilder {
        AppServerRuntimeBuilder::new()
    }

    /// The application container.
    pub fn container(&self) -> &Arc<ApplicationContainer> {
        &self.container
    }

    /// Root of the naming tree.
    pub fn naming_directory(&self) -> &Arc<NamingDirectory> {
        &self.naming_directory
    }

    /// Registry of the naming tree's directory identifiers.
    pub fn directories(&self) -> &Arc<DirectoryRegistry> {
        &self.directories
    }

    /// The deployed application named `name`.
    pub fn application(&self, name: &str) -> Option<Arc<Application>> {
        self.container.application(name)
    }

    /// Block until every application is connected or `timeout` elapses.
    ///
    /// Returns whether all applications connected.
    pub fn wait_until_connected(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let pending: Vec<String> = self
                .container
                .applications()
                .iter()
                .filter(|app| !app.is_connected())
                .map(|app| app.name().to_string())
                .collect();
            if pending.is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                warn!(pending = ?pending, "Applications not connected before timeout");
                return false;
            }
            thread::sleep(CONNECT_POLL);
        }
    }

    /// Check if every application is still running.
    pub fn is_running(&self) -> bool {
        self.container
            .applications()
            .iter()
            .all(|app| app.is_connected())
    }

    /// Gracefully shut down the runtime.
    ///
    /// Stops every application concurrently and removes the container binding.
    pub fn shutdown(self) -> Result<()> {
        info!("AppServerRuntime shutting down...");

        let stopped = self.container.stop_all();
        if let Err(e) = self.container.deregister() {
            warn!(error = %e, "Failed to deregister container");
        }

        match stopped {
            Ok(()) => {
                info!("AppServerRuntime shutdown complete");
                Ok(())
            }
            Err(e) => {
                error!("AppServerRuntime error during shutdown: {}", e);
                Err(e.into())
            }
        }
    }
}
