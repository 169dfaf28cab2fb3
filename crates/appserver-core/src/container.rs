// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Application container.
//!
//! The [`Container`] trait is what applications and the factory consume from
//! their host. [`ApplicationContainer`] is the in-process implementation that
//! tracks deployed applications and stops them concurrently.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use appserver_naming::{NamingDirectory, Value};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::application::{Application, ApplicationInfo};
use crate::error::Result;

/// Host of deployed applications.
pub trait Container: Send + Sync {
    /// Container name.
    fn name(&self) -> &str;

    /// Container runlevel.
    fn runlevel(&self) -> &str;

    /// Directory holding the application folders.
    fn app_base(&self) -> &Path;

    /// Directory holding the per-application temporary folders.
    fn tmp_dir(&self) -> &Path;

    /// Owner user of application files.
    fn user(&self) -> &str;

    /// Owner group of application files.
    fn group(&self) -> &str;

    /// File creation mask.
    fn umask(&self) -> u32;

    /// Whether provisioners run on application startup.
    fn provisioning_enabled(&self) -> bool;

    /// Root of the naming tree.
    fn naming_directory(&self) -> &Arc<NamingDirectory>;

    /// Register a deployed application.
    fn add_application(&self, application: Arc<Application>) -> Result<()>;

    /// The application named `name`.
    fn application(&self, name: &str) -> Option<Arc<Application>>;

    /// Every deployed application, ordered by name.
    fn applications(&self) -> Vec<Arc<Application>>;
}

/// Static container settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSettings {
    /// Container name
    pub name: String,
    /// Container runlevel
    pub runlevel: String,
    /// Application base directory
    pub app_base: PathBuf,
    /// Temporary directory
    pub tmp_dir: PathBuf,
    /// Owner user
    pub user: String,
    /// Owner group
    pub group: String,
    /// File creation mask
    pub umask: u32,
    /// Run provisioners on startup
    pub provisioning_enabled: bool,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            name: "combined-appserver".to_string(),
            runlevel: "application".to_string(),
            app_base: PathBuf::from("webapps"),
            tmp_dir: PathBuf::from("var/tmp"),
            user: "nobody".to_string(),
            group: "nobody".to_string(),
            umask: 0o002,
            provisioning_enabled: false,
        }
    }
}

/// In-process [`Container`].
pub struct ApplicationContainer {
    settings: ContainerSettings,
    naming_directory: Arc<NamingDirectory>,
    applications: DashMap<String, Arc<Application>>,
}

impl ApplicationContainer {
    /// Create a container on the naming tree rooted at `naming_directory`.
    pub fn new(settings: ContainerSettings, naming_directory: Arc<NamingDirectory>) -> Self {
        Self {
            settings,
            naming_directory,
            applications: DashMap::new(),
        }
    }

    /// The container settings.
    pub fn settings(&self) -> &ContainerSettings {
        &self.settings
    }

    /// `php:services/<runlevel>/<name>`, where the container registers itself.
    pub fn service_path(&self) -> String {
        let scheme = self
            .naming_directory
            .scheme()
            .unwrap_or_else(|| "php".to_string());
        format!(
            "{}:services/{}/{}",
            scheme, self.settings.runlevel, self.settings.name
        )
    }

    /// Bind this container at [`service_path`](Self::service_path).
    pub fn register(self: &Arc<Self>) -> Result<()> {
        let path = self.service_path();
        let services = path
            .rsplit_once('/')
            .map(|(parent, _)| parent.to_string())
            .unwrap_or_else(|| path.clone());
        self.naming_directory.create_subdirectories(&services)?;
        self.naming_directory.bind(
            &path,
            Value::Object(self.clone() as Arc<dyn Any + Send + Sync>),
        )?;
        info!(container = %self.settings.name, path = %path, "Container registered");
        Ok(())
    }

    /// Remove the binding made by [`register`](Self::register).
    pub fn deregister(&self) -> Result<()> {
        self.naming_directory.unbind(&self.service_path())?;
        Ok(())
    }

    /// Snapshots of every application.
    pub fn infos(&self) -> Vec<ApplicationInfo> {
        self.applications().iter().map(|app| app.info()).collect()
    }

    /// Remove the application named `name`.
    pub fn remove_application(&self, name: &str) -> Option<Arc<Application>> {
        self.applications.remove(name).map(|(_, app)| app)
    }

    /// Stop every application, one thread each.
    ///
    /// Returns the first failure after all applications have been handled.
    pub fn stop_all(&self) -> Result<()> {
        let applications = self.applications();
        info!(
            container = %self.settings.name,
            count = applications.len(),
            "Stopping applications"
        );

        let results: Vec<(String, Result<()>)> = thread::scope(|scope| {
            let handles: Vec<_> = applications
                .iter()
                .map(|app| (app.name().to_string(), scope.spawn(move || app.stop())))
                .collect();
            handles
                .into_iter()
                .map(|(name, handle)| {
                    let result = handle
                        .join()
                        .unwrap_or_else(|_| Err(crate::Error::WorkerTerminated(name.clone())));
                    (name, result)
                })
                .collect()
        });

        let mut first_error = None;
        for (name, result) in results {
            if let Err(e) = result {
                error!(application = %name, error = %e, "Failed to stop application");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Container for ApplicationContainer {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn runlevel(&self) -> &str {
        &self.settings.runlevel
    }

    fn app_base(&self) -> &Path {
        &self.settings.app_base
    }

    fn tmp_dir(&self) -> &Path {
        &self.settings.tmp_dir
    }

    fn user(&self) -> &str {
        &self.settings.user
    }

    fn group(&self) -> &str {
        &self.settings.group
    }

    fn umask(&self) -> u32 {
        self.settings.umask
    }

    fn provisioning_enabled(&self) -> bool {
        self.settings.provisioning_enabled
    }

    fn naming_directory(&self) -> &Arc<NamingDirectory> {
        &self.naming_directory
    }

    fn add_application(&self, application: Arc<Application>) -> Result<()> {
        info!(
            container = %self.settings.name,
            application = %application.name(),
            serial = %application.serial(),
            "Application registered"
        );
        self.applications
            .insert(application.name().to_string(), application);
        Ok(())
    }

    fn application(&self, name: &str) -> Option<Arc<Application>> {
        self.applications.get(name).map(|entry| entry.value().clone())
    }

    fn applications(&self) -> Vec<Arc<Application>> {
        let mut applications: Vec<Arc<Application>> = self
            .applications
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        applications.sort_by(|a, b| a.name().cmp(b.name()));
        applications
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::FilesystemServices;
    use appserver_naming::DirectoryRegistry;

    fn container() -> Arc<ApplicationContainer> {
        let root = NamingDirectory::root("php", Arc::new(DirectoryRegistry::new())).unwrap();
        Arc::new(ApplicationContainer::new(ContainerSettings::default(), root))
    }

    fn application(container: &ApplicationContainer, name: &str) -> Arc<Application> {
        Application::builder(name)
            .container_name(container.name())
            .naming_directory(container.naming_directory().clone())
            .services(Arc::new(FilesystemServices::new()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_binds_service_path() {
        let container = container();
        container.register().unwrap();

        let found = container
            .naming_directory()
            .search("php:services/application/combined-appserver", &[])
            .unwrap();
        assert!(found.downcast_ref::<ApplicationContainer>().is_some());

        container.deregister().unwrap();
        assert!(
            container
                .naming_directory()
                .search("php:services/application/combined-appserver", &[])
                .is_err()
        );
    }

    #[test]
    fn test_applications_sorted_by_name() {
        let container = container();
        container
            .add_application(application(&container, "zeta"))
            .unwrap();
        container
            .add_application(application(&container, "alpha"))
            .unwrap();

        let names: Vec<String> = container
            .applications()
            .iter()
            .map(|app| app.name().to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(container.application("zeta").is_some());
        assert!(container.remove_application("zeta").is_some());
        assert!(container.application("zeta").is_none());
    }

    #[test]
    fn test_stop_all_reports_unconnected_application() {
        let container = container();
        container
            .add_application(application(&container, "example"))
            .unwrap();

        assert!(matches!(
            container.stop_all(),
            Err(crate::Error::NotConnected(name)) if name == "example"
        ));
    }
}
