// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Application factory.
//!
//! [`ApplicationFactory::visit`] turns an [`ApplicationContext`] into a
//! prepared [`Application`] registered with its container. Component types
//! named in descriptors are resolved through a [`ComponentRegistry`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::application::{Application, DEFAULT_TICK};
use crate::components::{ClassLoader, Logger, Manager, Provisioner, TracingLogger};
use crate::container::Container;
use crate::descriptor::{ApplicationContext, ComponentConfig};
use crate::error::{Error, Result};
use crate::services::ContainerServices;

/// Sets up a component on an application in place of the registry constructor.
pub trait ComponentFactory: Send + Sync {
    /// Create the component described by `config` and add it to `application`.
    fn visit(&self, application: &Arc<Application>, config: &ComponentConfig) -> anyhow::Result<()>;
}

type Constructor<T> = Arc<dyn Fn(&ComponentConfig) -> anyhow::Result<Arc<T>> + Send + Sync>;

/// Type name → constructor tables, one per component kind.
#[derive(Default)]
pub struct ComponentRegistry {
    class_loaders: HashMap<String, Constructor<dyn ClassLoader>>,
    managers: HashMap<String, Constructor<dyn Manager>>,
    provisioners: HashMap<String, Constructor<dyn Provisioner>>,
    loggers: HashMap<String, Constructor<dyn Logger>>,
    factories: HashMap<String, Arc<dyn ComponentFactory>>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in `TracingLogger` logger type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_logger("TracingLogger", |config| {
            let channel = config.param_str("channel").unwrap_or(&config.name);
            Ok(Arc::new(TracingLogger::new(channel)) as Arc<dyn Logger>)
        });
        registry
    }

    /// Register a class loader type.
    pub fn register_class_loader<F>(&mut self, type_name: &str, constructor: F) -> &mut Self
    where
        F: Fn(&ComponentConfig) -> anyhow::Result<Arc<dyn ClassLoader>> + Send + Sync + 'static,
    {
        self.class_loaders
            .insert(type_name.to_string(), Arc::new(constructor));
        self
    }

    /// Register a manager type.
    pub fn register_manager<F>(&mut self, type_name: &str, constructor: F) -> &mut Self
    where
        F: Fn(&ComponentConfig) -> anyhow::Result<Arc<dyn Manager>> + Send + Sync + 'static,
    {
        self.managers
            .insert(type_name.to_string(), Arc::new(constructor));
        self
    }

    /// Register a provisioner type.
    pub fn register_provisioner<F>(&mut self, type_name: &str, constructor: F) -> &mut Self
    where
        F: Fn(&ComponentConfig) -> anyhow::Result<Arc<dyn Provisioner>> + Send + Sync + 'static,
    {
        self.provisioners
            .insert(type_name.to_string(), Arc::new(constructor));
        self
    }

    /// Register a logger type.
    pub fn register_logger<F>(&mut self, type_name: &str, constructor: F) -> &mut Self
    where
        F: Fn(&ComponentConfig) -> anyhow::Result<Arc<dyn Logger>> + Send + Sync + 'static,
    {
        self.loggers
            .insert(type_name.to_string(), Arc::new(constructor));
        self
    }

    /// Register a component factory.
    pub fn register_factory(&mut self, name: &str, factory: Arc<dyn ComponentFactory>) -> &mut Self {
        self.factories.insert(name.to_string(), factory);
        self
    }

    fn factory(&self, config: &ComponentConfig) -> Result<Option<Arc<dyn ComponentFactory>>> {
        match &config.factory {
            None => Ok(None),
            Some(name) => self
                .factories
                .get(name)
                .cloned()
                .map(Some)
                .ok_or_else(|| Error::UnknownComponent {
                    kind: "factory",
                    type_name: name.clone(),
                }),
        }
    }
}

fn construct<T: ?Sized>(
    table: &HashMap<String, Constructor<T>>,
    kind: &'static str,
    config: &ComponentConfig,
) -> Result<Arc<T>> {
    let constructor = table
        .get(&config.type_name)
        .ok_or_else(|| Error::UnknownComponent {
            kind,
            type_name: config.type_name.clone(),
        })?;
    constructor(config).map_err(|source| Error::Component {
        kind,
        name: config.name.clone(),
        source,
    })
}

/// Builds applications from descriptors.
pub struct ApplicationFactory {
    registry: Arc<ComponentRegistry>,
    services: Arc<dyn ContainerServices>,
    tick: Duration,
}

impl ApplicationFactory {
    /// Create a factory.
    pub fn new(registry: Arc<ComponentRegistry>, services: Arc<dyn ContainerServices>) -> Self {
        Self {
            registry,
            services,
            tick: DEFAULT_TICK,
        }
    }

    /// Set the idle tick of the applications built.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Build, prepare and register the application described by `context`.
    pub fn visit(
        &self,
        container: &dyn Container,
        context: &ApplicationContext,
    ) -> Result<Arc<Application>> {
        let webapp_path = container.app_base().join(&context.name);
        if !has_layout(&webapp_path) {
            return Err(Error::InvalidLayout {
                application: context.name.clone(),
                path: webapp_path,
            });
        }

        let mut builder = Application::builder(&context.name)
            .container_name(container.name())
            .container_runlevel(container.runlevel())
            .naming_directory(container.naming_directory().clone())
            .services(self.services.clone())
            .tick(self.tick);
        if let Some(environment_name) = &context.environment_name {
            builder = builder.environment_name(environment_name);
        }
        let application = builder.build().map_err(|source| Error::Component {
            kind: "application",
            name: context.name.clone(),
            source,
        })?;

        application.prepare(container)?;
        self.services.create_tmp_folders(&application)?;
        self.services.clean_up_folders(&application)?;

        for config in &context.class_loaders {
            self.add_component(&application, config, "class loader", |app, config| {
                let class_loader = construct(&self.registry.class_loaders, "class loader", config)?;
                app.add_class_loader(&config.name, class_loader)
            })?;
        }
        for config in &context.managers {
            self.add_component(&application, config, "manager", |app, config| {
                let manager = construct(&self.registry.managers, "manager", config)?;
                app.add_manager(&config.name, manager)
            })?;
        }
        for config in &context.provisioners {
            self.add_component(&application, config, "provisioner", |app, config| {
                let provisioner = construct(&self.registry.provisioners, "provisioner", config)?;
                app.add_provisioner(&config.name, provisioner)
            })?;
        }
        for config in &context.loggers {
            self.add_component(&application, config, "logger", |app, config| {
                let logger = construct(&self.registry.loggers, "logger", config)?;
                app.add_logger(&config.name, logger)
            })?;
        }

        container.add_application(application.clone())?;

        info!(
            application = %application.name(),
            container = %container.name(),
            class_loaders = context.class_loaders.len(),
            managers = context.managers.len(),
            provisioners = context.provisioners.len(),
            loggers = context.loggers.len(),
            "Application deployed"
        );
        Ok(application)
    }

    fn add_component<F>(
        &self,
        application: &Arc<Application>,
        config: &ComponentConfig,
        kind: &'static str,
        add: F,
    ) -> Result<()>
    where
        F: FnOnce(&Arc<Application>, &ComponentConfig) -> Result<()>,
    {
        match self.registry.factory(config)? {
            Some(factory) => {
                debug!(
                    application = %application.name(),
                    kind,
                    component = %config.name,
                    factory = ?config.factory,
                    "Visiting component factory"
                );
                factory
                    .visit(application, config)
                    .map_err(|source| Error::Component {
                        kind,
                        name: config.name.clone(),
                        source,
                    })
            }
            None => {
                debug!(
                    application = %application.name(),
                    kind,
                    component = %config.name,
                    type_name = %config.type_name,
                    "Instantiating component"
                );
                add(application, config)
            }
        }
    }
}

fn has_layout(webapp_path: &Path) -> bool {
    webapp_path.join("WEB-INF").is_dir() || webapp_path.join("META-INF").is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type() {
        let registry = ComponentRegistry::with_defaults();
        let err = construct(
            &registry.managers,
            "manager",
            &ComponentConfig::new("BeanContext", "BeanManager"),
        )
        .err()
        .unwrap();

        assert!(matches!(
            err,
            Error::UnknownComponent { kind: "manager", type_name } if type_name == "BeanManager"
        ));
    }

    #[test]
    fn test_default_logger_uses_channel_param() {
        let registry = ComponentRegistry::with_defaults();
        let logger = construct(
            &registry.loggers,
            "logger",
            &ComponentConfig::new("system", "TracingLogger").with_param("channel", "appserver"),
        );
        assert!(logger.is_ok());
    }

    #[test]
    fn test_unknown_factory() {
        let registry = ComponentRegistry::new();
        let config = ComponentConfig::new("BeanContext", "BeanManager").with_factory("BeanFactory");

        assert!(matches!(
            registry.factory(&config),
            Err(Error::UnknownComponent { kind: "factory", .. })
        ));
        assert!(
            registry
                .factory(&ComponentConfig::new("BeanContext", "BeanManager"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_layout_check() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!has_layout(dir.path()));

        std::fs::create_dir(dir.path().join("META-INF")).unwrap();
        assert!(has_layout(dir.path()));
    }
}
