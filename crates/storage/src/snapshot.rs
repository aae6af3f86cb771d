// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot envelope for persisted server state.
//!
//! A snapshot wraps the [`PersistedState`] with a schema version and a
//! creation time. Loading goes through the migration registry first, so a
//! snapshot written by an older schema is upgraded before deserializing.

use crate::migration::{MigrationError, MigrationRegistry};
use crate::state::PersistedState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current snapshot schema version
pub const CURRENT_SNAPSHOT_VERSION: u32 = 2;

/// zstd frame magic number, used to detect compressed snapshots
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

const COMPRESSION_LEVEL: i32 = 3;

/// Errors that can occur in snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),
}

/// The persisted server state at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema version for migrations
    #[serde(rename = "v")]
    pub version: u32,
    pub state: PersistedState,
    /// When this snapshot was created
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(state: PersistedState) -> Self {
        Self { version: CURRENT_SNAPSHOT_VERSION, state, created_at: Utc::now() }
    }

    /// Encode as JSON, optionally zstd-compressed.
    pub fn encode(&self, compress: bool) -> Result<Vec<u8>, SnapshotError> {
        let json = serde_json::to_vec(self)?;
        if compress {
            Ok(zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL)?)
        } else {
            Ok(json)
        }
    }

    /// Decode bytes written by [`Snapshot::encode`], migrating older schemas.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let json = if bytes.starts_with(&ZSTD_MAGIC) {
            zstd::decode_all(bytes)?
        } else {
            bytes.to_vec()
        };
        let raw: serde_json::Value = serde_json::from_slice(&json)?;
        let migrated = MigrationRegistry::current().migrate_to(raw, CURRENT_SNAPSHOT_VERSION)?;
        Ok(serde_json::from_value(migrated)?)
    }
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
/// The oldest backup is removed when the limit is reached.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    // Remove the oldest if at capacity
    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    // Shift existing backups up by one
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
