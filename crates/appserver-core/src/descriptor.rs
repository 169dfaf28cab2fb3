// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Application descriptors.
//!
//! Value objects describing what to deploy. They are usually loaded from a
//! JSON file:
//!
//! ```json
//! [
//!   {
//!     "name": "example",
//!     "managers": [
//!       { "name": "BeanContext", "type": "BeanManager", "params": { "lifetime": 1440 } }
//!     ],
//!     "loggers": [{ "name": "system", "type": "TracingLogger" }]
//!   }
//! ]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Deployment descriptor of one application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationContext {
    /// Application name, also the folder name below the container's app base.
    pub name: String,
    /// Environment name. Defaults to the application name.
    #[serde(default)]
    pub environment_name: Option<String>,
    /// Class loaders, in injection order.
    #[serde(default)]
    pub class_loaders: Vec<ComponentConfig>,
    /// Managers, in injection order.
    #[serde(default)]
    pub managers: Vec<ComponentConfig>,
    /// Provisioners, in injection order.
    #[serde(default)]
    pub provisioners: Vec<ComponentConfig>,
    /// Loggers, in injection order.
    #[serde(default)]
    pub loggers: Vec<ComponentConfig>,
}

/// Configuration of one component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Name the component is registered under.
    pub name: String,
    /// Registered type to instantiate.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Registered factory that sets the component up instead.
    #[serde(default)]
    pub factory: Option<String>,
    /// Free-form parameters.
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
}

impl ComponentConfig {
    /// Create a config for `name` of type `type_name`.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    /// Set up the component through `factory`.
    pub fn with_factory(mut self, factory: impl Into<String>) -> Self {
        self.factory = Some(factory.into());
        self
    }

    /// Add a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// String parameter.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    /// Unsigned integer parameter.
    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(|v| v.as_u64())
    }
}

/// Load descriptors from a JSON file holding an array of [`ApplicationContext`].
pub fn load_descriptors(path: &Path) -> Result<Vec<ApplicationContext>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
