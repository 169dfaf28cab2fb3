// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Connection trait definitions.
//!
//! Defines the abstract interface the [`InitialContext`](crate::InitialContext)
//! resolves beans through.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::identifier::{EnterpriseBeanResourceIdentifier, RemoteEndpoint};
use crate::value::Value;

/// The application a naming client acts for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApplicationScope {
    /// Name of the container hosting the application.
    pub container_name: String,
    /// Application name.
    pub application_name: String,
}

impl ApplicationScope {
    /// Create a scope.
    pub fn new(container_name: impl Into<String>, application_name: impl Into<String>) -> Self {
        Self {
            container_name: container_name.into(),
            application_name: application_name.into(),
        }
    }

    /// `<container>/<application>`, the prefix of the application's global bindings.
    pub fn unique_name(&self) -> String {
        format!("{}/{}", self.container_name, self.application_name)
    }
}

impl fmt::Display for ApplicationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unique_name())
    }
}

/// A connection beans are resolved through.
///
/// Connections are PURE resolvers - they do not cache proxies; the caller
/// decides about connection reuse.
pub trait BeanConnection: Send + Sync {
    /// Connection type identifier (e.g. "local", "http", "mock")
    fn connection_type(&self) -> &'static str;

    /// Resolve the bean addressed by `identifier` for `session_id`.
    fn lookup(
        &self,
        identifier: &EnterpriseBeanResourceIdentifier,
        session_id: &str,
        args: &[Value],
    ) -> Result<Value>;
}

/// Opens connections for the [`InitialContext`](crate::InitialContext).
pub trait ConnectionFactory: Send + Sync {
    /// In-process connection bound to `scope`.
    fn local(&self, scope: &ApplicationScope) -> Result<Arc<dyn BeanConnection>>;

    /// Connection to a remote endpoint.
    fn remote(&self, endpoint: &RemoteEndpoint) -> Result<Arc<dyn BeanConnection>>;
}

/// Opens remote connections; the wire protocol lives outside this crate.
pub trait RemoteConnector: Send + Sync {
    /// Connect to `endpoint`.
    fn connect(&self, endpoint: &RemoteEndpoint) -> Result<Arc<dyn BeanConnection>>;
}

/// Supplies the session of an attached request, if any.
pub trait SessionProvider: Send + Sync {
    /// Session id of the active request session.
    fn session_id(&self) -> Option<String>;
}
