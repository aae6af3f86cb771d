// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ag-storage: persistence of the agent server's registries across restarts

mod migration;
mod snapshot;
mod state;
mod store;

pub use migration::{InitializedFlag, Migration, MigrationError, MigrationRegistry};
pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::{InstanceRecord, PersistedState};
pub use store::{FileStore, MemoryStore, SnapshotStore};
