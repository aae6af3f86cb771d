// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine crate.

use crate::config::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

/// Resolve state directory: AG_STATE_DIR > XDG_STATE_HOME/ag > ~/.local/state/ag
pub fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("AG_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("ag"));
    }
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/ag"))
}

/// Worker pool size override
pub fn max_workers() -> Option<usize> {
    std::env::var("AG_MAX_WORKERS").ok().and_then(|s| s.parse::<usize>().ok()).filter(|n| *n > 0)
}

/// Shutdown drain timeout override
pub fn shutdown_timeout() -> Option<Duration> {
    std::env::var("AG_SHUTDOWN_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Snapshot compression override (`1`/`true` or `0`/`false`)
pub fn compress_snapshots() -> Option<bool> {
    std::env::var("AG_COMPRESS_SNAPSHOTS").ok().and_then(|s| match s.as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    })
}
