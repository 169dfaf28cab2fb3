// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Values stored in a naming directory.
//!
//! A binding is either a plain [`Value`] or a [`Callback`] with a fixed argument
//! prefix that is invoked lazily at search time.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::directory::NamingDirectory;
use crate::error::Result;

/// A value bound in, or resolved from, a naming directory.
#[derive(Clone)]
pub enum Value {
    /// Scalar data such as paths, user names or numbers.
    Scalar(serde_json::Value),
    /// An arbitrary shared object (managers, services, connections).
    Object(Arc<dyn Any + Send + Sync>),
    /// A nested naming directory.
    Directory(Arc<NamingDirectory>),
}

impl Value {
    /// The null scalar.
    pub fn null() -> Self {
        Value::Scalar(serde_json::Value::Null)
    }

    /// Wrap an arbitrary object.
    pub fn object<T: Any + Send + Sync>(object: T) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Check whether this is the null scalar.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(serde_json::Value::Null))
    }

    /// Get the string content of a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Get the integer content of a numeric scalar.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Scalar(v) => v.as_i64(),
            _ => None,
        }
    }

    /// Get the scalar payload.
    pub fn as_scalar(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Get the nested directory.
    pub fn as_directory(&self) -> Option<&Arc<NamingDirectory>> {
        match self {
            Value::Directory(dir) => Some(dir),
            _ => None,
        }
    }

    /// Borrow an object value as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Object(object) => object.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Directory(a), Value::Directory(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(v) => write!(f, "Scalar({})", v),
            Value::Object(_) => f.write_str("Object(..)"),
            Value::Directory(dir) => write!(f, "Directory({})", dir.name()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Scalar(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Scalar(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Scalar(serde_json::Value::String(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Scalar(serde_json::Value::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Scalar(serde_json::Value::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Scalar(serde_json::Value::Bool(value))
    }
}

impl From<Arc<NamingDirectory>> for Value {
    fn from(value: Arc<NamingDirectory>) -> Self {
        Value::Directory(value)
    }
}

/// A lazily invoked binding.
///
/// Called with the bound argument prefix followed by the search-time arguments.
pub type Callback = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// What a directory attribute holds.
#[derive(Clone)]
pub enum Bound {
    /// A concrete value returned as-is by `search`.
    Value(Value),
    /// A callable invoked by `search`.
    Callback {
        /// The callable.
        callback: Callback,
        /// Fixed arguments passed before the search-time arguments.
        args: Vec<Value>,
    },
}

impl Bound {
    /// Get the nested directory of a value binding.
    pub fn as_directory(&self) -> Option<&Arc<NamingDirectory>> {
        match self {
            Bound::Value(value) => value.as_directory(),
            Bound::Callback { .. } => None,
        }
    }

    /// Resolve this binding, invoking callbacks with `bound ++ call_args`.
    pub(crate) fn resolve(&self, call_args: &[Value]) -> Result<Value> {
        match self {
            Bound::Value(value) => Ok(value.clone()),
            Bound::Callback { callback, args } => {
                let mut all = Vec::with_capacity(args.len() + call_args.len());
                all.extend_from_slice(args);
                all.extend_from_slice(call_args);
                callback(&all)
            }
        }
    }
}

impl fmt::Debug for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Bound::Callback { args, .. } => f.debug_struct("Callback").field("args", args).finish(),
        }
    }
}
