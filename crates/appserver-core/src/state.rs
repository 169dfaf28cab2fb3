// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Application lifecycle states.
//!
//! ```text
//! WAITING_FOR_INITIALIZATION ──▶ INITIALIZATION_SUCCESSFUL ──stop()──▶ HALT ──▶ SHUTDOWN
//! ```
//!
//! `DEPLOYMENT_SUCCESSFUL` and `SERVERS_STARTED_SUCCESSFUL` belong to the
//! container; applications never enter them.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// State of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationState {
    /// Stop requested.
    Halt = 0,
    /// Worker started, components not yet initialized.
    WaitingForInitialization = 1,
    /// Components initialized, application running.
    InitializationSuccessful = 2,
    /// Deployment finished.
    DeploymentSuccessful = 3,
    /// Servers started.
    ServersStartedSuccessful = 4,
    /// Shutdown complete.
    Shutdown = 5,
}

/// State errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    /// The numeric value is not a known state.
    #[error("Requested application state {value} is not available (choose one of: {valid})")]
    InvalidState {
        /// The requested value.
        value: i64,
        /// Comma separated list of valid values.
        valid: String,
    },
}

impl ApplicationState {
    /// Every state, ordered by value.
    pub const ALL: [ApplicationState; 6] = [
        ApplicationState::Halt,
        ApplicationState::WaitingForInitialization,
        ApplicationState::InitializationSuccessful,
        ApplicationState::DeploymentSuccessful,
        ApplicationState::ServersStartedSuccessful,
        ApplicationState::Shutdown,
    ];

    /// Look a state up by its numeric value.
    pub fn get(value: i64) -> Result<Self, StateError> {
        Self::ALL
            .into_iter()
            .find(|state| state.value() == value)
            .ok_or_else(|| StateError::InvalidState {
                value,
                valid: Self::ALL
                    .iter()
                    .map(|state| state.value().to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            })
    }

    /// Numeric value.
    pub fn value(self) -> i64 {
        self as i64
    }

    /// Same numeric value.
    pub fn equals(self, other: ApplicationState) -> bool {
        self.value() == other.value()
    }

    /// Different numeric value.
    pub fn not_equals(self, other: ApplicationState) -> bool {
        !self.equals(other)
    }

    /// Numeric value at least that of `other`.
    pub fn greater_or_equal_than(self, other: ApplicationState) -> bool {
        self.value() >= other.value()
    }

    /// Constant name.
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationState::Halt => "HALT",
            ApplicationState::WaitingForInitialization => "WAITING_FOR_INITIALIZATION",
            ApplicationState::InitializationSuccessful => "INITIALIZATION_SUCCESSFUL",
            ApplicationState::DeploymentSuccessful => "DEPLOYMENT_SUCCESSFUL",
            ApplicationState::ServersStartedSuccessful => "SERVERS_STARTED_SUCCESSFUL",
            ApplicationState::Shutdown => "SHUTDOWN",
        }
    }
}

impl TryFrom<i64> for ApplicationState {
    type Error = StateError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::get(value)
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
