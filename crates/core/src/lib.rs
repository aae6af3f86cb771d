// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ag-core: data model shared by the Agent Grid engine and storage crates

pub mod macros;

pub mod clock;
pub mod definition;
pub mod id;
pub mod records;
pub mod status;
pub mod user;
pub mod value;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use definition::{
    AgentCondition, AgentDefinition, AgentTimer, DataSourceReference, DefinitionError, FieldDecl,
    Interval, ScriptDecl, INIT_SCRIPT, INPUTS_CHANGED_SCRIPT,
};
pub use id::{short, InstanceId};
pub use records::{AgentState, ExceptionRecord, History, OutputRecord, ScriptRun, ScriptStatus};
pub use status::{ConditionStatus, TimerStatus};
pub use user::User;
pub use value::{
    as_interval_ms, is_truthy, table_to_value, Category, FieldType, SymbolTable, Value,
    MAX_INTERVAL_MS,
};
