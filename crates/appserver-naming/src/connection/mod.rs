// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Connection module - bean resolution backends.

mod local;
pub mod mock;
mod traits;

pub use local::{DirectoryConnectionFactory, LocalConnection};
pub use mock::{MockConnection, MockConnectionFactory};
pub use traits::*;
