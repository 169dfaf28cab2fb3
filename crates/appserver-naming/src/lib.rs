// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Appserver Naming - Hierarchical Naming Directory
//!
//! This crate provides the in-process naming tree applications use for
//! service discovery, resource binding and dependency injection, together with
//! the bean lookup client built on top of it.
//!
//! # Naming Tree
//!
//! ```text
//! php:
//! ├── env/
//! │   └── <container>/<application>/   appBase, webappPath, tmpDirectory, ...
//! ├── global/
//! │   ├── <container>/<application>/   managers, class loaders, provisioners
//! │   └── log/<container>/<application>/   loggers
//! └── services/<runlevel>/<container>
//! ```
//!
//! Every directory of a tree shares one [`DirectoryRegistry`] that keeps
//! identifiers (`php:env/combined-appserver/example`) unique.
//!
//! # Bean Lookups
//!
//! | Name | Resolved through |
//! |------|------------------|
//! | `php:app/<Class>/local` | local connection of the current application |
//! | `php:global/<app>/<Class>/local` | local connection, context `<app>` |
//! | `php:global/<app>/<Class>/remote` | cached remote connection per endpoint |
//!
//! # Modules
//!
//! - [`directory`]: The naming tree node
//! - [`registry`]: Directory identifier registry
//! - [`value`]: Bound values and callbacks
//! - [`identifier`]: Resource identifiers parsed from URLs and properties
//! - [`lexer`]: Bean lookup name lexer and parser
//! - [`context`]: The bean lookup client
//! - [`connection`]: Local, remote and mock bean connections
//! - [`error`]: Error types

#![deny(missing_docs)]

/// Bean connections (local, remote, mock).
pub mod connection;

/// Bean lookup client.
pub mod context;

/// Hierarchical naming directory.
pub mod directory;

/// Error types for naming operations.
pub mod error;

/// URL-like resource identifiers.
pub mod identifier;

/// Lookup name lexer.
pub mod lexer;

/// Directory identifier registry.
pub mod registry;

/// Values and callbacks stored in directories.
pub mod value;

pub use connection::{
    ApplicationScope, BeanConnection, ConnectionFactory, DirectoryConnectionFactory,
    LocalConnection, RemoteConnector, SessionProvider,
};
pub use context::{InitialContext, LookupProperties};
pub use directory::NamingDirectory;
pub use error::{NamingError, Result};
pub use identifier::{
    BeanInterface, EnterpriseBeanResourceIdentifier, Properties, RemoteEndpoint,
    ResourceIdentifier,
};
pub use registry::DirectoryRegistry;
pub use value::{Bound, Callback, Value};
