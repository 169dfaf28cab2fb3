// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-manager shutdown threads.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::application::Application;
use crate::components::Manager;

/// Stops one manager on its own thread.
///
/// The application starts one per manager and joins all of them before it
/// enters `SHUTDOWN`. Joining has no timeout.
pub struct ManagerShutdownThread {
    manager: String,
    handle: Option<JoinHandle<()>>,
}

impl ManagerShutdownThread {
    /// Start stopping `manager`.
    ///
    /// The thread registers the application's class loaders before it calls
    /// [`Manager::stop`]. If no thread can be spawned the manager is stopped on
    /// the calling thread.
    pub fn spawn(
        application: Arc<Application>,
        manager_name: String,
        manager: Arc<dyn Manager>,
    ) -> Self {
        let thread_application = application.clone();
        let name = manager_name.clone();
        let thread_manager = manager.clone();

        let spawned = thread::Builder::new()
            .name(format!("shutdown-{}", manager_name))
            .spawn(move || stop_manager(&thread_application, &name, thread_manager.as_ref()));

        match spawned {
            Ok(handle) => Self {
                manager: manager_name,
                handle: Some(handle),
            },
            Err(e) => {
                warn!(manager = %manager_name, error = %e, "Can't spawn shutdown thread, stopping inline");
                stop_manager(&application, &manager_name, manager.as_ref());
                Self {
                    manager: manager_name,
                    handle: None,
                }
            }
        }
    }

    /// Name of the manager being stopped.
    pub fn manager(&self) -> &str {
        &self.manager
    }

    /// Wait until the manager is stopped.
    pub fn join(self) {
        if let Some(handle) = self.handle
            && handle.join().is_err()
        {
            error!(manager = %self.manager, "Manager shutdown thread panicked");
        }
    }
}

fn stop_manager(application: &Application, name: &str, manager: &dyn Manager) {
    let started = Instant::now();

    if let Err(e) = application.register_class_loaders() {
        error!(
            application = %application.name(),
            manager = %name,
            error = %e,
            "Failed to register class loaders on shutdown thread"
        );
    }

    debug!(application = %application.name(), manager = %name, "Stopping manager");
    match manager.stop() {
        Ok(()) => debug!(
            application = %application.name(),
            manager = %name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Manager stopped"
        ),
        Err(e) => error!(
            application = %application.name(),
            manager = %name,
            error = %e,
            "Manager failed to stop"
        ),
    }
}
