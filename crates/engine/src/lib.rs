// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ag-engine: scheduler, agent runtime, and server lifecycle

mod activity;
mod admin;
mod config;
pub mod env;
mod error;
mod graph;
mod instance;
mod registry;
mod runtime;
mod scheduler;
mod script;
mod server;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use activity::{Activity, ActivityKind};
pub use admin::{InstanceSummary, Request, Response};
pub use config::{ConfigError, ServerConfig};
pub use error::EngineError;
pub use graph::DependencyGraph;
pub use instance::{AgentInstance, BusyGuard};
pub use registry::Registry;
pub use runtime::{InstanceOptions, Runtime, RuntimeConfig};
pub use scheduler::{
    ActivityHandler, CompletedActivity, Outcome, Scheduler, SchedulerConfig, SchedulerError,
    SchedulerState,
};
pub use script::{ScriptContext, ScriptError, ScriptRunner};
pub use server::{AgentServer, ServerStatus};
