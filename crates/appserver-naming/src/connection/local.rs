// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-process connections backed by the naming directory.

use std::sync::Arc;

use super::traits::*;
use crate::directory::NamingDirectory;
use crate::error::{NamingError, Result};
use crate::identifier::{EnterpriseBeanResourceIdentifier, RemoteEndpoint};
use crate::value::Value;

/// Resolves beans from `php:global/<container>/<context>/<class>`.
///
/// The session id is passed as the first search argument, followed by the
/// lookup arguments.
pub struct LocalConnection {
    directory: Arc<NamingDirectory>,
    scope: ApplicationScope,
}

impl LocalConnection {
    /// Create a connection for `scope`.
    pub fn new(directory: Arc<NamingDirectory>, scope: ApplicationScope) -> Self {
        Self { directory, scope }
    }

    /// Naming path of a bean.
    pub fn bean_path(&self, identifier: &EnterpriseBeanResourceIdentifier) -> Result<String> {
        let class_name = identifier
            .class_name
            .as_deref()
            .ok_or_else(|| NamingError::Connection("bean identifier has no class name".into()))?;
        let context = identifier
            .context_name
            .as_deref()
            .unwrap_or(&self.scope.application_name);
        let scheme = self.directory.scheme().unwrap_or_else(|| "php".to_string());

        Ok(format!(
            "{}:global/{}/{}/{}",
            scheme, self.scope.container_name, context, class_name
        ))
    }
}

impl BeanConnection for LocalConnection {
    fn connection_type(&self) -> &'static str {
        "local"
    }

    fn lookup(
        &self,
        identifier: &EnterpriseBeanResourceIdentifier,
        session_id: &str,
        args: &[Value],
    ) -> Result<Value> {
        let path = self.bean_path(identifier)?;

        let mut search_args = Vec::with_capacity(args.len() + 1);
        search_args.push(Value::from(session_id));
        search_args.extend_from_slice(args);

        tracing::debug!(
            path = %path,
            session_id = %session_id,
            application = %self.scope,
            "Local bean lookup"
        );
        self.directory.search(&path, &search_args)
    }
}

/// Connection factory for a naming tree.
///
/// Local connections resolve through the directory; remote connections are
/// delegated to an optional [`RemoteConnector`].
pub struct DirectoryConnectionFactory {
    directory: Arc<NamingDirectory>,
    remote: Option<Arc<dyn RemoteConnector>>,
}

impl DirectoryConnectionFactory {
    /// Create a factory without remote support.
    pub fn new(directory: Arc<NamingDirectory>) -> Self {
        Self {
            directory,
            remote: None,
        }
    }

    /// Enable remote lookups through `connector`.
    pub fn with_remote(mut self, connector: Arc<dyn RemoteConnector>) -> Self {
        self.remote = Some(connector);
        self
    }
}

impl ConnectionFactory for DirectoryConnectionFactory {
    fn local(&self, scope: &ApplicationScope) -> Result<Arc<dyn BeanConnection>> {
        Ok(Arc::new(LocalConnection::new(
            self.directory.clone(),
            scope.clone(),
        )))
    }

    fn remote(&self, endpoint: &RemoteEndpoint) -> Result<Arc<dyn BeanConnection>> {
        match &self.remote {
            Some(connector) => connector.connect(endpoint),
            None => Err(NamingError::RemoteUnavailable {
                endpoint: endpoint.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DirectoryRegistry;

    fn identifier(class: &str, context: Option<&str>) -> EnterpriseBeanResourceIdentifier {
        EnterpriseBeanResourceIdentifier {
            class_name: Some(class.to_string()),
            context_name: context.map(str::to_string),
            interface: Some("local".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_local_lookup_passes_session_first() {
        let root = NamingDirectory::root("php", Arc::new(DirectoryRegistry::new())).unwrap();
        root.create_subdirectories("global/combined/example").unwrap();
        root.bind_callback(
            "php:global/combined/example/UserProcessor",
            |args| Ok(Value::from(format!("{:?}", args))),
            Vec::new(),
        )
        .unwrap();

        let connection = LocalConnection::new(root, ApplicationScope::new("combined", "example"));
        let found = connection
            .lookup(&identifier("UserProcessor", None), "sess-1", &[Value::from(7i64)])
            .unwrap();

        assert_eq!(found.as_str(), Some(r#"[Scalar("sess-1"), Scalar(7)]"#));
    }

    #[test]
    fn test_bean_path_uses_context_name() {
        let root = NamingDirectory::root("php", Arc::new(DirectoryRegistry::new())).unwrap();
        let connection = LocalConnection::new(root, ApplicationScope::new("combined", "example"));

        assert_eq!(
            connection
                .bean_path(&identifier("Processor", Some("other")))
                .unwrap(),
            "php:global/combined/other/Processor"
        );
    }

    #[test]
    fn test_remote_without_connector() {
        let root = NamingDirectory::root("php", Arc::new(DirectoryRegistry::new())).unwrap();
        let factory = DirectoryConnectionFactory::new(root);
        let endpoint = RemoteEndpoint {
            transport: "http".into(),
            host: "127.0.0.1".into(),
            port: 8585,
            context: "example".into(),
            index_file: "index.pc".into(),
        };

        assert!(matches!(
            factory.remote(&endpoint),
            Err(NamingError::RemoteUnavailable { .. })
        ));
    }
}
