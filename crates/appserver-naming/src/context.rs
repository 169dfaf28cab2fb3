// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Naming client.
//!
//! [`InitialContext`] turns a bean lookup name such as
//! `php:global/example/UserProcessor/remote` into an
//! [`EnterpriseBeanResourceIdentifier`] and resolves it through a local or a
//! cached remote [`BeanConnection`].

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::connection::{ApplicationScope, BeanConnection, ConnectionFactory, SessionProvider};
use crate::error::{NamingError, Result};
use crate::identifier::{
    BeanInterface, EnterpriseBeanResourceIdentifier, RemoteEndpoint, ResourceIdentifier,
};
use crate::lexer::{self, Scope};
use crate::value::Value;

/// Defaults applied to every lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupProperties {
    /// Scheme of lookup names.
    pub scheme: String,
    /// Transport for remote lookups.
    pub transport: String,
    /// Host of remote lookups.
    pub host: String,
    /// Port of remote lookups.
    pub port: u16,
    /// Index file of remote lookups.
    pub index_file: String,
}

impl Default for LookupProperties {
    fn default() -> Self {
        Self {
            scheme: "php".to_string(),
            transport: "http".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8585,
            index_file: "index.pc".to_string(),
        }
    }
}

/// Bean lookup client of one application.
pub struct InitialContext {
    scope: ApplicationScope,
    properties: LookupProperties,
    factory: Arc<dyn ConnectionFactory>,
    session_provider: Option<Arc<dyn SessionProvider>>,
    local: OnceCell<Arc<dyn BeanConnection>>,
    remote: DashMap<RemoteEndpoint, Arc<dyn BeanConnection>>,
}

impl InitialContext {
    /// Create a context for the application `scope` with default properties.
    pub fn new(scope: ApplicationScope, factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            scope,
            properties: LookupProperties::default(),
            factory,
            session_provider: None,
            local: OnceCell::new(),
            remote: DashMap::new(),
        }
    }

    /// Override the lookup defaults.
    pub fn with_properties(mut self, properties: LookupProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Attach the session source of the current request.
    pub fn with_session_provider(mut self, provider: Arc<dyn SessionProvider>) -> Self {
        self.session_provider = Some(provider);
        self
    }

    /// The application this context acts for.
    pub fn scope(&self) -> &ApplicationScope {
        &self.scope
    }

    /// The lookup defaults.
    pub fn properties(&self) -> &LookupProperties {
        &self.properties
    }

    /// Number of cached remote connections.
    pub fn remote_connection_count(&self) -> usize {
        self.remote.len()
    }

    /// Parse a lookup name into a bean identifier.
    pub fn identifier(&self, name: &str) -> Result<EnterpriseBeanResourceIdentifier> {
        if name.trim().is_empty() {
            return Err(NamingError::MalformedName {
                name: name.to_string(),
                reason: "empty lookup name".to_string(),
            });
        }

        let parsed = lexer::parse(name, &self.properties.scheme)?;
        let context_name = match parsed.scope {
            Scope::App => self.scope.application_name.clone(),
            Scope::Global(context) => context,
        };

        Ok(EnterpriseBeanResourceIdentifier {
            resource: ResourceIdentifier {
                scheme: Some(self.properties.scheme.clone()),
                host: Some(self.properties.host.clone()),
                port: Some(self.properties.port),
                ..Default::default()
            },
            class_name: Some(parsed.class_name),
            context_name: Some(context_name),
            interface: parsed.interface,
            transport: Some(self.properties.transport.clone()),
            index_file: Some(self.properties.index_file.clone()),
        })
    }

    /// Resolve the bean named `name`.
    ///
    /// The session id is taken from `session_id`, then from the attached
    /// [`SessionProvider`], and is freshly generated otherwise.
    pub fn lookup(&self, name: &str, session_id: Option<&str>, args: &[Value]) -> Result<Value> {
        let identifier = self.identifier(name)?;
        let session_id = self.session_id(session_id);

        let connection = match identifier.bean_interface() {
            Some(BeanInterface::Local) => self.local_connection()?,
            Some(BeanInterface::Remote) => {
                let endpoint =
                    identifier
                        .remote_endpoint()
                        .ok_or_else(|| NamingError::UnknownInterface {
                            name: name.to_string(),
                        })?;
                self.remote_connection(endpoint)?
            }
            None => {
                return Err(NamingError::UnknownInterface {
                    name: name.to_string(),
                });
            }
        };

        debug!(
            name = %name,
            session_id = %session_id,
            connection = connection.connection_type(),
            "Looking up bean"
        );
        connection.lookup(&identifier, &session_id, args)
    }

    fn session_id(&self, explicit: Option<&str>) -> String {
        if let Some(session_id) = explicit {
            return session_id.to_string();
        }
        self.session_provider
            .as_ref()
            .and_then(|provider| provider.session_id())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }

    fn local_connection(&self) -> Result<Arc<dyn BeanConnection>> {
        self.local
            .get_or_try_init(|| self.factory.local(&self.scope))
            .cloned()
    }

    fn remote_connection(&self, endpoint: RemoteEndpoint) -> Result<Arc<dyn BeanConnection>> {
        if let Some(connection) = self.remote.get(&endpoint) {
            return Ok(connection.value().clone());
        }

        let connection = self.factory.remote(&endpoint)?;
        info!(endpoint = %endpoint, "Opened remote bean connection");
        Ok(self.remote.entry(endpoint).or_insert(connection).value().clone())
    }
}
