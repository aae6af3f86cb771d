// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server configuration: TOML file, then environment overrides.

use crate::env;
use crate::scheduler::SchedulerConfig;
use ag_storage::FileStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("cannot resolve a state directory (set AG_STATE_DIR or HOME)")]
    NoStateDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory holding the snapshot file. Empty means resolve from the environment.
    pub state_dir: PathBuf,
    pub snapshot_file: String,
    pub compress_snapshots: bool,
    pub max_workers: usize,
    pub completed_capacity: usize,
    /// Exceptions kept per instance
    pub exception_history_limit: usize,
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::new(),
            snapshot_file: "snapshot.json".to_string(),
            compress_snapshots: false,
            max_workers: 16,
            completed_capacity: 1024,
            exception_history_limit: 100,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl ServerConfig {
    /// Config rooted at `dir`, ignoring the environment.
    pub fn for_dir(dir: impl Into<PathBuf>) -> Self {
        Self { state_dir: dir.into(), ..Self::default() }
    }

    /// Load from an optional TOML file and apply `AG_*` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        toml::from_str(&text)
            .map_err(|source| ConfigError::Toml { path: path.to_path_buf(), source })
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if std::env::var_os("AG_STATE_DIR").is_some() || self.state_dir.as_os_str().is_empty() {
            self.state_dir = env::state_dir()?;
        }
        if let Some(n) = env::max_workers() {
            self.max_workers = n;
        }
        if let Some(timeout) = env::shutdown_timeout() {
            self.shutdown_timeout_ms = timeout.as_millis() as u64;
        }
        if let Some(compress) = env::compress_snapshots() {
            self.compress_snapshots = compress;
        }
        Ok(())
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.state_dir.join(&self.snapshot_file)
    }

    pub fn file_store(&self) -> FileStore {
        FileStore::new(self.snapshot_path()).compressed(self.compress_snapshots)
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_workers: self.max_workers,
            completed_capacity: self.completed_capacity,
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
