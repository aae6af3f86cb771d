// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot schema migrations.
//!
//! Snapshots are migrated as raw JSON before being deserialized, one version
//! step at a time, so older snapshots keep loading after the schema moves on.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("snapshot version {0} is newer than supported version {1}")]
    TooNew(u32, u32),
    #[error("no migration path from version {0} to {1}")]
    NoPath(u32, u32),
    #[error("snapshot has no version field")]
    MissingVersion,
    #[error("migration failed: {0}")]
    Failed(String),
}

/// A single version step.
pub trait Migration: Send + Sync {
    fn source_version(&self) -> u32;
    fn target_version(&self) -> u32;
    fn migrate(&self, snapshot: &mut Value) -> Result<(), MigrationError>;
}

#[derive(Default)]
pub struct MigrationRegistry {
    pub(crate) migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every step up to the current snapshot version.
    pub fn current() -> Self {
        Self { migrations: vec![Box::new(InitializedFlag)] }
    }

    /// Migrate a raw snapshot to `target`, rewriting its `v` field.
    pub fn migrate_to(&self, mut snapshot: Value, target: u32) -> Result<Value, MigrationError> {
        let mut version = snapshot
            .get("v")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .ok_or(MigrationError::MissingVersion)?;

        if version > target {
            return Err(MigrationError::TooNew(version, target));
        }

        while version < target {
            let step = self
                .migrations
                .iter()
                .find(|m| m.source_version() == version)
                .ok_or(MigrationError::NoPath(version, target))?;
            step.migrate(&mut snapshot)?;
            version = step.target_version();
            if let Some(obj) = snapshot.as_object_mut() {
                obj.insert("v".into(), version.into());
            }
        }

        Ok(snapshot)
    }
}

/// v1 → v2: instance records gain `initialized`.
///
/// v1 ran `init` on first enable and never persisted that it had, so every
/// v1 instance has already been through it.
pub struct InitializedFlag;

impl Migration for InitializedFlag {
    fn source_version(&self) -> u32 {
        1
    }

    fn target_version(&self) -> u32 {
        2
    }

    fn migrate(&self, snapshot: &mut Value) -> Result<(), MigrationError> {
        let Some(instances) = snapshot.pointer_mut("/state/instances") else {
            return Ok(());
        };
        let instances = instances
            .as_array_mut()
            .ok_or_else(|| MigrationError::Failed("instances is not a list".into()))?;
        for record in instances {
            let obj = record
                .as_object_mut()
                .ok_or_else(|| MigrationError::Failed("instance is not an object".into()))?;
            obj.entry("initialized").or_insert(Value::Bool(true));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
