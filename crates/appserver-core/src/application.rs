// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployed applications.
//!
//! An [`Application`] owns its components and runs on a dedicated worker
//! thread once [`connect`](Application::connect)ed:
//!
//! 1. class loaders are registered in reverse injection order
//! 2. managers are initialized
//! 3. provisioners run, if the container enables provisioning
//! 4. the state becomes `INITIALIZATION_SUCCESSFUL` and the worker idles
//!
//! [`stop`](Application::stop) requests `HALT`; the worker then stops every
//! manager on its own [`ManagerShutdownThread`], waits for all of them, enters
//! `SHUTDOWN` and unloads its naming bindings.

use std::cmp::Reverse;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use appserver_naming::{NamingDirectory, NamingError, Value};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::components::{ClassLoader, ComponentMap, Logger, Manager, Provisioner};
use crate::container::Container;
use crate::error::{Error, Result};
use crate::services::ContainerServices;
use crate::shutdown::ManagerShutdownThread;
use crate::state::ApplicationState;

/// Default tick of the worker's idle loop.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

const STOP_TICK: Duration = Duration::from_secs(1);

/// Keys bound under `php:env/<uniqueName>/` by [`Application::prepare`].
pub mod env_keys {
    /// Container application base directory.
    pub const APP_BASE: &str = "appBase";
    /// Application folder.
    pub const WEBAPP_PATH: &str = "webappPath";
    /// Application temporary directory.
    pub const TMP_DIRECTORY: &str = "tmpDirectory";
    /// Application cache directory.
    pub const CACHE_DIRECTORY: &str = "cacheDirectory";
    /// Application session directory.
    pub const SESSION_DIRECTORY: &str = "sessionDirectory";
    /// Owner user.
    pub const USER: &str = "user";
    /// Owner group.
    pub const GROUP: &str = "group";
    /// File creation mask.
    pub const UMASK: &str = "umask";
}

/// Point-in-time view of an application.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInfo {
    /// Serial number.
    pub serial: Uuid,
    /// Application name.
    pub name: String,
    /// `<container>/<application>`.
    pub unique_name: String,
    /// Current state.
    pub state: ApplicationState,
    /// Construction time.
    pub created_at: DateTime<Utc>,
    /// Time the worker thread was started.
    pub connected_at: Option<DateTime<Utc>>,
    /// Number of class loaders.
    pub class_loaders: usize,
    /// Number of managers.
    pub managers: usize,
    /// Number of provisioners.
    pub provisioners: usize,
    /// Number of loggers.
    pub loggers: usize,
}

/// Builder for an [`Application`].
pub struct ApplicationBuilder {
    name: String,
    environment_name: Option<String>,
    container_name: Option<String>,
    container_runlevel: String,
    naming_directory: Option<Arc<NamingDirectory>>,
    services: Option<Arc<dyn ContainerServices>>,
    tick: Duration,
}

impl ApplicationBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            environment_name: None,
            container_name: None,
            container_runlevel: "application".to_string(),
            naming_directory: None,
            services: None,
            tick: DEFAULT_TICK,
        }
    }

    /// Set the environment name.
    ///
    /// Default: the application name
    pub fn environment_name(mut self, name: impl Into<String>) -> Self {
        self.environment_name = Some(name.into());
        self
    }

    /// Set the hosting container's name (required).
    pub fn container_name(mut self, name: impl Into<String>) -> Self {
        self.container_name = Some(name.into());
        self
    }

    /// Set the hosting container's runlevel.
    ///
    /// Default: `application`
    pub fn container_runlevel(mut self, runlevel: impl Into<String>) -> Self {
        self.container_runlevel = runlevel.into();
        self
    }

    /// Set the naming directory (required).
    pub fn naming_directory(mut self, directory: Arc<NamingDirectory>) -> Self {
        self.naming_directory = Some(directory);
        self
    }

    /// Set the container services (required).
    pub fn services(mut self, services: Arc<dyn ContainerServices>) -> Self {
        self.services = Some(services);
        self
    }

    /// Set the tick of the worker's idle loop.
    ///
    /// Default: 100 milliseconds
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Build the application.
    pub fn build(self) -> anyhow::Result<Arc<Application>> {
        let container_name = self
            .container_name
            .ok_or_else(|| anyhow::anyhow!("container_name is required"))?;
        let naming_directory = self
            .naming_directory
            .ok_or_else(|| anyhow::anyhow!("naming_directory is required"))?;
        let services = self
            .services
            .ok_or_else(|| anyhow::anyhow!("services are required"))?;
        if self.name.is_empty() {
            anyhow::bail!("application name must not be empty");
        }

        let environment_name = self.environment_name.unwrap_or_else(|| self.name.clone());

        Ok(Arc::new_cyclic(|this| Application {
            serial: Uuid::new_v4(),
            name: self.name,
            environment_name,
            container_name,
            container_runlevel: self.container_runlevel,
            naming_directory,
            services,
            tick: self.tick,
            provisioning_enabled: AtomicBool::new(false),
            state: Mutex::new(ApplicationState::WaitingForInitialization),
            state_changed: Condvar::new(),
            class_loaders: ComponentMap::new(),
            managers: ComponentMap::new(),
            provisioners: ComponentMap::new(),
            loggers: ComponentMap::new(),
            bindings: Mutex::new(Vec::new()),
            worker: Mutex::new(None),
            created_at: Utc::now(),
            connected_at: Mutex::new(None),
            this: this.clone(),
        }))
    }
}

/// A deployed application.
pub struct Application {
    serial: Uuid,
    name: String,
    environment_name: String,
    container_name: String,
    container_runlevel: String,
    naming_directory: Arc<NamingDirectory>,
    services: Arc<dyn ContainerServices>,
    tick: Duration,
    provisioning_enabled: AtomicBool,
    state: Mutex<ApplicationState>,
    state_changed: Condvar,
    class_loaders: ComponentMap<dyn ClassLoader>,
    managers: ComponentMap<dyn Manager>,
    provisioners: ComponentMap<dyn Provisioner>,
    loggers: ComponentMap<dyn Logger>,
    bindings: Mutex<Vec<String>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    created_at: DateTime<Utc>,
    connected_at: Mutex<Option<DateTime<Utc>>>,
    this: Weak<Application>,
}

impl Application {
    /// Create a builder for an application named `name`.
    pub fn builder(name: impl Into<String>) -> ApplicationBuilder {
        ApplicationBuilder::new(name)
    }

    /// Serial number generated at construction.
    pub fn serial(&self) -> Uuid {
        self.serial
    }

    /// Application name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Environment name.
    pub fn environment_name(&self) -> &str {
        &self.environment_name
    }

    /// Name of the hosting container.
    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// Runlevel of the hosting container.
    pub fn container_runlevel(&self) -> &str {
        &self.container_runlevel
    }

    /// `<container>/<application>`.
    pub fn unique_name(&self) -> String {
        format!("{}/{}", self.container_name, self.name)
    }

    /// The naming directory the application binds into.
    pub fn naming_directory(&self) -> &Arc<NamingDirectory> {
        &self.naming_directory
    }

    /// Container services.
    pub fn services(&self) -> &Arc<dyn ContainerServices> {
        &self.services
    }

    /// Current state.
    pub fn state(&self) -> ApplicationState {
        *self.lock_state()
    }

    /// Whether the application is running.
    pub fn is_connected(&self) -> bool {
        self.state() == ApplicationState::InitializationSuccessful
    }

    /// Whether provisioners run on startup.
    pub fn is_provisioning_enabled(&self) -> bool {
        self.provisioning_enabled.load(Ordering::SeqCst)
    }

    /// Snapshot of the application.
    pub fn info(&self) -> ApplicationInfo {
        ApplicationInfo {
            serial: self.serial,
            name: self.name.clone(),
            unique_name: self.unique_name(),
            state: self.state(),
            created_at: self.created_at,
            connected_at: *self
                .connected_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            class_loaders: self.class_loaders.len(),
            managers: self.managers.len(),
            provisioners: self.provisioners.len(),
            loggers: self.loggers.len(),
        }
    }

    /// Create the application's naming directories and bind its environment.
    ///
    /// Calling `prepare` again rebinds every value.
    pub fn prepare(&self, container: &dyn Container) -> Result<()> {
        let unique_name = self.unique_name();
        let env_path = self.naming_path(&format!("env/{}", unique_name));
        let global_path = self.naming_path(&format!("global/{}", unique_name));
        let log_path = self.naming_path(&format!("global/log/{}", unique_name));

        let env = self.naming_directory.create_subdirectories(&env_path)?;
        self.naming_directory.create_subdirectories(&global_path)?;
        self.naming_directory.create_subdirectories(&log_path)?;

        let webapp_path = container.app_base().join(&self.name);
        let tmp_directory = container.tmp_dir().join(&self.name);
        let environment: [(&str, Value); 8] = [
            (env_keys::APP_BASE, path_value(container.app_base().to_path_buf())),
            (env_keys::WEBAPP_PATH, path_value(webapp_path)),
            (env_keys::TMP_DIRECTORY, path_value(tmp_directory.clone())),
            (env_keys::CACHE_DIRECTORY, path_value(tmp_directory.join("cache"))),
            (env_keys::SESSION_DIRECTORY, path_value(tmp_directory.join("session"))),
            (env_keys::USER, Value::from(container.user())),
            (env_keys::GROUP, Value::from(container.group())),
            (env_keys::UMASK, Value::from(container.umask())),
        ];
        for (key, value) in environment {
            env.bind(key, value)?;
            self.record_binding(format!("{}/{}", env_path, key));
        }
        for path in [env_path, global_path, log_path] {
            self.record_binding(path);
        }

        self.provisioning_enabled
            .store(container.provisioning_enabled(), Ordering::SeqCst);

        info!(
            application = %self.name,
            unique_name = %unique_name,
            provisioning = container.provisioning_enabled(),
            "Application prepared"
        );
        Ok(())
    }

    /// Remove every binding made by [`prepare`](Self::prepare) and the `add_*` methods.
    ///
    /// Paths that are already gone are skipped, so repeated calls are harmless.
    pub fn unload(&self) {
        let mut bindings: Vec<String> = self
            .bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        // Deepest paths first, directories after their entries.
        bindings.sort_by_key(|path| Reverse(path.matches('/').count()));

        for path in bindings {
            match self.naming_directory.unbind(&path) {
                Ok(()) => debug!(application = %self.name, path = %path, "Unbound"),
                Err(NamingError::NotBound { .. } | NamingError::NotFound { .. }) => {
                    debug!(application = %self.name, path = %path, "Already unbound")
                }
                Err(e) => warn!(application = %self.name, path = %path, error = %e, "Failed to unbind"),
            }
        }

        info!(application = %self.name, "Application unloaded");
    }

    /// Register a class loader and bind it at `php:global/<uniqueName>/<name>`.
    pub fn add_class_loader(&self, name: &str, class_loader: Arc<dyn ClassLoader>) -> Result<()> {
        self.class_loaders.insert(name, class_loader);
        self.bind_component(&format!("global/{}/{}", self.unique_name(), name), name, |app, name| {
            app.get_class_loader(name).map(Value::object)
        })
    }

    /// Register a manager and bind it at `php:global/<uniqueName>/<name>`.
    pub fn add_manager(&self, name: &str, manager: Arc<dyn Manager>) -> Result<()> {
        self.managers.insert(name, manager);
        self.bind_component(&format!("global/{}/{}", self.unique_name(), name), name, |app, name| {
            app.get_manager(name).map(Value::object)
        })
    }

    /// Register a provisioner and bind it at `php:global/<uniqueName>/<name>`.
    pub fn add_provisioner(&self, name: &str, provisioner: Arc<dyn Provisioner>) -> Result<()> {
        self.provisioners.insert(name, provisioner);
        self.bind_component(&format!("global/{}/{}", self.unique_name(), name), name, |app, name| {
            app.get_provisioner(name).map(Value::object)
        })
    }

    /// Register a logger and bind it at `php:global/log/<uniqueName>/<name>`.
    pub fn add_logger(&self, name: &str, logger: Arc<dyn Logger>) -> Result<()> {
        self.loggers.insert(name, logger);
        self.bind_component(
            &format!("global/log/{}/{}", self.unique_name(), name),
            name,
            |app, name| app.get_logger(name).map(Value::object),
        )
    }

    /// The class loader registered as `name`.
    pub fn get_class_loader(&self, name: &str) -> Option<Arc<dyn ClassLoader>> {
        self.class_loaders.get(name)
    }

    /// The manager registered as `name`.
    pub fn get_manager(&self, name: &str) -> Option<Arc<dyn Manager>> {
        self.managers.get(name)
    }

    /// The provisioner registered as `name`.
    pub fn get_provisioner(&self, name: &str) -> Option<Arc<dyn Provisioner>> {
        self.provisioners.get(name)
    }

    /// The logger registered as `name`.
    pub fn get_logger(&self, name: &str) -> Option<Arc<dyn Logger>> {
        self.loggers.get(name)
    }

    /// Names of the registered managers, in registration order.
    pub fn manager_names(&self) -> Vec<String> {
        self.managers.entries().into_iter().map(|(name, _)| name).collect()
    }

    /// Resolve `name` relative to `php:global/<uniqueName>/`.
    pub fn search(&self, name: &str, args: &[Value]) -> Result<Value> {
        let path = self.naming_path(&format!("global/{}/{}", self.unique_name(), name));
        Ok(self.naming_directory.search(&path, args)?)
    }

    /// Resolve an environment value bound by [`prepare`](Self::prepare).
    pub fn environment(&self, key: &str) -> Result<Value> {
        let path = self.naming_path(&format!("env/{}/{}", self.unique_name(), key));
        Ok(self.naming_directory.search(&path, &[])?)
    }

    /// The application folder.
    pub fn webapp_path(&self) -> Result<PathBuf> {
        self.environment_path(env_keys::WEBAPP_PATH)
    }

    /// The application's temporary directory.
    pub fn tmp_dir(&self) -> Result<PathBuf> {
        self.environment_path(env_keys::TMP_DIRECTORY)
    }

    /// The application's cache directory.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        self.environment_path(env_keys::CACHE_DIRECTORY)
    }

    /// The application's session directory.
    pub fn session_dir(&self) -> Result<PathBuf> {
        self.environment_path(env_keys::SESSION_DIRECTORY)
    }

    /// The file creation mask.
    pub fn umask(&self) -> Result<u32> {
        let value = self.environment(env_keys::UMASK)?;
        value
            .as_i64()
            .and_then(|umask| u32::try_from(umask).ok())
            .ok_or_else(|| {
                Error::Naming(NamingError::Callback {
                    name: env_keys::UMASK.to_string(),
                    message: format!("expected a numeric umask, got {:?}", value),
                })
            })
    }

    /// Register class loaders, last injected first.
    pub fn register_class_loaders(&self) -> Result<()> {
        for (name, class_loader) in self.class_loaders.entries().into_iter().rev() {
            debug!(application = %self.name, class_loader = %name, "Registering class loader");
            class_loader
                .register(self)
                .map_err(|source| Error::Component {
                    kind: "class loader",
                    name,
                    source,
                })?;
        }
        Ok(())
    }

    /// Initialize every manager in registration order.
    pub fn initialize_managers(&self) -> Result<()> {
        for (name, manager) in self.managers.entries() {
            debug!(application = %self.name, manager = %name, "Now initialize manager");
            manager.initialize(self).map_err(|source| Error::Component {
                kind: "manager",
                name: name.clone(),
                source,
            })?;
            debug!(application = %self.name, manager = %name, "Successfully initialized manager");
        }
        Ok(())
    }

    /// Run every provisioner in registration order.
    pub fn provision(&self) -> Result<()> {
        for (name, provisioner) in self.provisioners.entries() {
            info!(application = %self.name, provisioner = %name, "Provisioning");
            provisioner
                .provision(self)
                .map_err(|source| Error::Component {
                    kind: "provisioner",
                    name: name.clone(),
                    source,
                })?;
            debug!(application = %self.name, provisioner = %name, "Successfully provisioned");
        }
        Ok(())
    }

    /// Start the worker thread.
    pub fn connect(&self) -> Result<()> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            warn!(application = %self.name, "Application already connected");
            return Ok(());
        }
        let state = self.state();
        if state != ApplicationState::WaitingForInitialization {
            return Err(Error::AlreadyStopped {
                application: self.name.clone(),
                state,
            });
        }
        let Some(this) = self.this.upgrade() else {
            return Err(Error::NotConnected(self.name.clone()));
        };

        let handle = thread::Builder::new()
            .name(format!("app-{}", self.name))
            .spawn(move || this.run())?;
        *worker = Some(handle);
        *self
            .connected_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());

        info!(application = %self.name, serial = %self.serial, "Application worker started");
        Ok(())
    }

    /// Request `HALT` and block until the worker reached `SHUTDOWN`.
    pub fn stop(&self) -> Result<()> {
        let Some(handle) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return match self.state() {
                ApplicationState::Shutdown => Ok(()),
                _ => Err(Error::NotConnected(self.name.clone())),
            };
        };

        info!(application = %self.name, "Stopping application");
        {
            let mut state = self.lock_state();
            if *state != ApplicationState::Shutdown {
                *state = ApplicationState::Halt;
            }
            self.state_changed.notify_all();
        }

        let mut state = self.lock_state();
        while *state != ApplicationState::Shutdown {
            if handle.is_finished() {
                error!(application = %self.name, state = ?*state, "Worker exited before shutdown");
                drop(state);
                let _ = handle.join();
                return Err(Error::WorkerTerminated(self.name.clone()));
            }
            state = self
                .state_changed
                .wait_timeout(state, STOP_TICK)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
            if *state != ApplicationState::Shutdown {
                info!(application = %self.name, state = ?*state, "Waiting for application to shut down");
            }
        }
        drop(state);

        if handle.join().is_err() {
            return Err(Error::WorkerTerminated(self.name.clone()));
        }
        info!(application = %self.name, "Application stopped");
        Ok(())
    }

    fn run(self: Arc<Self>) {
        info!(application = %self.name, "Application worker running");

        match panic::catch_unwind(AssertUnwindSafe(|| self.run_body())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(application = %self.name, error = %e, "Application failed"),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(application = %self.name, panic = %message, "Application worker panicked");
            }
        }

        // Wake a waiting stop() in case the body failed.
        self.state_changed.notify_all();
    }

    fn run_body(self: &Arc<Self>) -> Result<()> {
        self.register_class_loaders()?;
        self.initialize_managers()?;
        if self.is_provisioning_enabled() {
            self.provision()?;
        }

        {
            let mut state = self.lock_state();
            if *state != ApplicationState::Halt {
                *state = ApplicationState::InitializationSuccessful;
                self.state_changed.notify_all();
                info!(application = %self.name, "Application initialized");
            }
        }

        let mut state = self.lock_state();
        while *state == ApplicationState::InitializationSuccessful {
            state = self
                .state_changed
                .wait_timeout(state, self.tick)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        drop(state);

        info!(application = %self.name, "Shutting down managers");
        let threads: Vec<ManagerShutdownThread> = self
            .managers
            .entries()
            .into_iter()
            .map(|(name, manager)| ManagerShutdownThread::spawn(self.clone(), name, manager))
            .collect();
        for thread in threads {
            thread.join();
        }

        self.set_state(ApplicationState::Shutdown);
        info!(application = %self.name, "Application shut down");

        self.unload();
        Ok(())
    }

    fn set_state(&self, next: ApplicationState) {
        let mut state = self.lock_state();
        debug!(application = %self.name, from = ?*state, to = ?next, "State transition");
        *state = next;
        self.state_changed.notify_all();
    }

    fn lock_state(&self) -> MutexGuard<'_, ApplicationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn naming_path(&self, path: &str) -> String {
        let scheme = self
            .naming_directory
            .scheme()
            .unwrap_or_else(|| "php".to_string());
        format!("{}:{}", scheme, path)
    }

    fn environment_path(&self, key: &str) -> Result<PathBuf> {
        let value = self.environment(key)?;
        value.as_str().map(PathBuf::from).ok_or_else(|| {
            Error::Naming(NamingError::Callback {
                name: key.to_string(),
                message: format!("expected a path, got {:?}", value),
            })
        })
    }

    fn record_binding(&self, path: String) {
        let mut bindings = self.bindings.lock().unwrap_or_else(PoisonError::into_inner);
        if !bindings.contains(&path) {
            bindings.push(path);
        }
    }

    fn bind_component<F>(&self, path: &str, name: &str, resolve: F) -> Result<()>
    where
        F: Fn(&Application, &str) -> Option<Value> + Send + Sync + 'static,
    {
        let path = self.naming_path(path);
        let application = self.this.clone();
        let component = name.to_string();
        let alias = path.clone();

        self.naming_directory.bind_callback(
            &path,
            move |_args| {
                let Some(application) = application.upgrade() else {
                    return Err(NamingError::Callback {
                        name: alias.clone(),
                        message: "application is gone".to_string(),
                    });
                };
                resolve(&application, &component).ok_or_else(|| NamingError::Callback {
                    name: alias.clone(),
                    message: format!("{} is no longer registered", component),
                })
            },
            Vec::new(),
        )?;

        self.record_binding(path);
        Ok(())
    }
}

fn path_value(path: PathBuf) -> Value {
    Value::from(path.to_string_lossy().into_owned())
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("serial", &self.serial)
            .field("name", &self.name)
            .field("container_name", &self.container_name)
            .field("state", &self.state())
            .finish()
    }
}
