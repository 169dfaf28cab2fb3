// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock connections for testing.
//!
//! Connections that record lookups and answer with a fixed value instead of
//! resolving anything.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::traits::*;
use crate::error::{NamingError, Result};
use crate::identifier::{EnterpriseBeanResourceIdentifier, RemoteEndpoint};
use crate::value::Value;

/// A recorded lookup.
#[derive(Debug, Clone)]
pub struct RecordedLookup {
    /// Bean class name of the lookup.
    pub class_name: Option<String>,
    /// Session id the lookup was made for.
    pub session_id: String,
    /// Lookup arguments.
    pub args: Vec<Value>,
}

/// Mock connection for testing.
pub struct MockConnection {
    lookups: Mutex<Vec<RecordedLookup>>,
    /// Value returned by every lookup
    pub response: Value,
    /// If true, lookups fail
    pub fail_by_default: bool,
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnection {
    /// Create a mock connection answering with null.
    pub fn new() -> Self {
        Self::responding(Value::null())
    }

    /// Create a mock connection answering with `response`.
    pub fn responding(response: impl Into<Value>) -> Self {
        Self {
            lookups: Mutex::new(Vec::new()),
            response: response.into(),
            fail_by_default: false,
        }
    }

    /// Create a mock connection whose lookups fail.
    pub fn failing() -> Self {
        Self {
            fail_by_default: true,
            ..Self::new()
        }
    }

    /// Lookups made so far.
    pub fn lookups(&self) -> Vec<RecordedLookup> {
        self.lookups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl BeanConnection for MockConnection {
    fn connection_type(&self) -> &'static str {
        "mock"
    }

    fn lookup(
        &self,
        identifier: &EnterpriseBeanResourceIdentifier,
        session_id: &str,
        args: &[Value],
    ) -> Result<Value> {
        self.lookups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedLookup {
                class_name: identifier.class_name.clone(),
                session_id: session_id.to_string(),
                args: args.to_vec(),
            });

        if self.fail_by_default {
            return Err(NamingError::Connection(format!(
                "mock lookup of {} failed",
                identifier.class_name.as_deref().unwrap_or("<unnamed>")
            )));
        }
        Ok(self.response.clone())
    }
}

/// Mock factory handing out shared mock connections and counting opens.
pub struct MockConnectionFactory {
    /// Connection returned for local lookups
    pub local: Arc<MockConnection>,
    /// Connection returned for remote lookups
    pub remote: Arc<MockConnection>,
    local_opens: AtomicUsize,
    remote_opens: AtomicUsize,
}

impl Default for MockConnectionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnectionFactory {
    /// Create a factory with two null-answering connections.
    pub fn new() -> Self {
        Self::with_connections(MockConnection::new(), MockConnection::new())
    }

    /// Create a factory with the given local and remote connections.
    pub fn with_connections(local: MockConnection, remote: MockConnection) -> Self {
        Self {
            local: Arc::new(local),
            remote: Arc::new(remote),
            local_opens: AtomicUsize::new(0),
            remote_opens: AtomicUsize::new(0),
        }
    }

    /// Number of local connections opened.
    pub fn local_opens(&self) -> usize {
        self.local_opens.load(Ordering::SeqCst)
    }

    /// Number of remote connections opened.
    pub fn remote_opens(&self) -> usize {
        self.remote_opens.load(Ordering::SeqCst)
    }
}

impl ConnectionFactory for MockConnectionFactory {
    fn local(&self, _scope: &ApplicationScope) -> Result<Arc<dyn BeanConnection>> {
        self.local_opens.fetch_add(1, Ordering::SeqCst);
        Ok(self.local.clone())
    }

    fn remote(&self, _endpoint: &RemoteEndpoint) -> Result<Arc<dyn BeanConnection>> {
        self.remote_opens.fetch_add(1, Ordering::SeqCst);
        Ok(self.remote.clone())
    }
}
