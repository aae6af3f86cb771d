// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot stores: where the server puts its state between runs.

use crate::snapshot::{rotate_bak_path, Snapshot, SnapshotError};
use crate::state::PersistedState;
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Persistence collaborator used at `start()` and `shutdown()`.
pub trait SnapshotStore: Send + Sync + 'static {
    fn save(&self, state: &PersistedState) -> Result<(), SnapshotError>;

    /// Load the last saved state, or `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<PersistedState>, SnapshotError>;
}

/// Stores the snapshot in a single file.
///
/// Writes go to a temp file that is renamed into place; the previous
/// snapshot is kept as a rotated `.bak`.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    compress: bool,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), compress: false }
    }

    pub fn compressed(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileStore {
    fn save(&self, state: &PersistedState) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = Snapshot::new(state.clone()).encode(self.compress)?;

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        if self.path.exists() {
            fs::rename(&self.path, rotate_bak_path(&self.path))?;
        }
        fs::rename(&tmp, &self.path)?;

        info!(
            path = %self.path.display(),
            bytes = bytes.len(),
            instances = state.instances.len(),
            "saved snapshot"
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedState>, SnapshotError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot file");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let snapshot = Snapshot::decode(&bytes)?;
        info!(
            path = %self.path.display(),
            created_at = %snapshot.created_at,
            instances = snapshot.state.instances.len(),
            "loaded snapshot"
        );
        Ok(Some(snapshot.state))
    }
}

/// Keeps the encoded snapshot in memory. Clones share the same slot, so a
/// test can hand one clone to a server and inspect or reuse the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<Vec<u8>>>>,
    saves: Arc<Mutex<u32>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `save` has been called.
    pub fn save_count(&self) -> u32 {
        *self.saves.lock()
    }
}

impl SnapshotStore for MemoryStore {
    fn save(&self, state: &PersistedState) -> Result<(), SnapshotError> {
        let bytes = Snapshot::new(state.clone()).encode(false)?;
        *self.slot.lock() = Some(bytes);
        *self.saves.lock() += 1;
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedState>, SnapshotError> {
        match self.slot.lock().as_deref() {
            Some(bytes) => Ok(Some(Snapshot::decode(bytes)?.state)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
