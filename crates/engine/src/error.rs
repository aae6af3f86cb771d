// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types

use crate::scheduler::SchedulerError;
use crate::script::ScriptError;
use ag_core::DefinitionError;
use ag_storage::SnapshotError;
use thiserror::Error;

/// Errors returned by registry and instance operations.
///
/// Script failures raised while an activity runs are not errors at this
/// level: they are recorded on the instance and logged.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error("unknown user '{0}'")]
    UnknownUser(String),
    #[error("user '{0}' already exists")]
    DuplicateUser(String),
    #[error("unknown definition '{user}/{name}'")]
    UnknownDefinition { user: String, name: String },
    #[error("definition '{user}/{name}' already exists")]
    DuplicateDefinition { user: String, name: String },
    #[error("definition '{user}/{name}' still has {count} instance(s)")]
    DefinitionInUse { user: String, name: String, count: usize },
    #[error("definition '{user}/{name}' is an input of '{by}'")]
    DefinitionReferenced { user: String, name: String, by: String },
    #[error("unknown instance '{user}/{name}'")]
    UnknownInstance { user: String, name: String },
    #[error("instance '{user}/{name}' already exists")]
    DuplicateInstance { user: String, name: String },
    #[error("definition '{definition}' has no script named '{script}'")]
    UnknownScript { definition: String, script: String },
    #[error("definition '{definition}' has no timer named '{timer}'")]
    UnknownTimer { definition: String, timer: String },
    #[error("definition '{definition}' has no condition named '{condition}'")]
    UnknownCondition { definition: String, condition: String },
    #[error("instance '{instance}' still has {count} dependent instance(s)")]
    HasDependents { instance: String, count: usize },
    #[error("interval of {what} '{name}' did not evaluate to a positive number: {reason}")]
    BadInterval { what: &'static str, name: String, reason: String },
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Storage(#[from] SnapshotError),
    #[error("script failed: {0}")]
    Script(#[from] ScriptError),
}
