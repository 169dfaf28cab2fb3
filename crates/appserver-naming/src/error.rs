// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for appserver-naming.

use thiserror::Error;

/// Naming errors.
///
/// Every resolution failure names the requested path and the identifier of the
/// directory where resolution stopped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum NamingError {
    /// No token of the requested name resolved to a binding.
    #[error("Can't resolve {name} in naming directory {directory}")]
    NotFound {
        /// The requested name.
        name: String,
        /// Identifier of the directory where resolution stopped.
        directory: String,
    },

    /// The final token of the name has no binding to remove.
    #[error("Can't unbind {name} from naming directory {directory}: not bound")]
    NotBound {
        /// The requested name.
        name: String,
        /// Identifier of the directory where resolution stopped.
        directory: String,
    },

    /// A path segment with more path remaining is bound to a non-directory value.
    #[error("Can't bind {name} to value of naming directory {directory}: {token} is not a directory")]
    NotADirectory {
        /// The requested name.
        name: String,
        /// The offending path segment.
        token: String,
        /// Identifier of the directory holding the segment.
        directory: String,
    },

    /// A directory with the same identifier is already registered.
    #[error("Naming directory {identifier} has already been registered")]
    DuplicateDirectory {
        /// The duplicate identifier.
        identifier: String,
    },

    /// The name is empty or syntactically invalid.
    #[error("Invalid name '{name}' for naming directory {directory}")]
    InvalidName {
        /// The requested name.
        name: String,
        /// Identifier of the directory that rejected the name.
        directory: String,
    },

    /// The scheme prefix does not match the root directory's scheme.
    #[error("Scheme of {name} doesn't match naming directory scheme {scheme}")]
    SchemeMismatch {
        /// The requested name.
        name: String,
        /// The root directory's scheme.
        scheme: String,
    },

    /// A root directory has no scheme, so no identifier can be built.
    #[error("Missing scheme for naming directory {name}")]
    MissingScheme {
        /// Name of the detached directory.
        name: String,
    },

    /// A subdirectory filter is not a valid regular expression.
    #[error("Invalid filter pattern '{pattern}': {message}")]
    InvalidFilter {
        /// The offending pattern.
        pattern: String,
        /// Compiler message.
        message: String,
    },

    /// A bean lookup name could not be parsed.
    #[error("Malformed lookup name '{name}': {reason}")]
    MalformedName {
        /// The lookup name.
        name: String,
        /// Why parsing failed.
        reason: String,
    },

    /// A bean lookup name names neither a local nor a remote interface.
    #[error("Can't find a local or remote interface for lookup {name}")]
    UnknownInterface {
        /// The lookup name.
        name: String,
    },

    /// A resource URL could not be parsed.
    #[error("Invalid resource identifier '{url}': {message}")]
    InvalidUrl {
        /// The URL.
        url: String,
        /// Parser message.
        message: String,
    },

    /// No remote connector is configured for a remote lookup.
    #[error("No remote connection available for {endpoint}")]
    RemoteUnavailable {
        /// The requested endpoint.
        endpoint: String,
    },

    /// A bound callback failed.
    #[error("Callback bound to {name} failed: {message}")]
    Callback {
        /// The requested name.
        name: String,
        /// Failure description.
        message: String,
    },

    /// A connection failed to resolve a bean.
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Result type using NamingError.
pub type Result<T> = std::result::Result<T, NamingError>;
