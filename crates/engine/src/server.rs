// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server lifecycle: restore, dispatch, shut down, persist.

use crate::config::ServerConfig;
use crate::error::EngineError;
use crate::runtime::{Runtime, RuntimeConfig};
use crate::scheduler::{ActivityHandler, Scheduler, SchedulerState};
use crate::script::ScriptRunner;
use ag_core::{Clock, SystemClock};
use ag_storage::SnapshotStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Point-in-time view of the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub state: SchedulerState,
    pub pending: usize,
    pub in_flight: usize,
    pub completed: u64,
    pub skipped: u64,
    pub users: usize,
    pub instances: usize,
}

/// Owns the runtime, its scheduler, and the snapshot store.
///
/// A server runs once: `start` restores the last snapshot and begins
/// dispatching, `shutdown` stops dispatching and saves. A restart is a new
/// server over the same store.
pub struct AgentServer<R: ScriptRunner, S: SnapshotStore, C: Clock = SystemClock> {
    runtime: Arc<Runtime<R, C>>,
    store: S,
    config: ServerConfig,
}

impl<R: ScriptRunner, S: SnapshotStore> AgentServer<R, S, SystemClock> {
    pub fn new(config: ServerConfig, runner: R, store: S) -> Self {
        Self::with_clock(config, runner, store, SystemClock)
    }
}

impl<R: ScriptRunner, S: SnapshotStore, C: Clock> AgentServer<R, S, C> {
    pub fn with_clock(config: ServerConfig, runner: R, store: S, clock: C) -> Self {
        let scheduler = Scheduler::new(config.scheduler());
        let runtime_config =
            RuntimeConfig { exception_history_limit: config.exception_history_limit };
        let runtime = Arc::new(Runtime::new(runner, clock, scheduler, runtime_config));
        Self { runtime, store, config }
    }

    pub fn runtime(&self) -> &Arc<Runtime<R, C>> {
        &self.runtime
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Restore the last snapshot, start dispatching, and re-arm enabled instances.
    pub async fn start(&self) -> Result<(), EngineError> {
        if self.runtime.scheduler().state() == SchedulerState::Shutdown {
            return Err(crate::scheduler::SchedulerError::ShutDown.into());
        }
        if let Some(state) = self.store.load()? {
            self.runtime.restore(state)?;
        }
        let handler: Arc<dyn ActivityHandler> = Arc::clone(&self.runtime) as _;
        self.runtime.scheduler().start(handler)?;
        self.runtime.resume_instances().await;
        tracing::info!(instances = self.runtime.instances().len(), "agent server started");
        Ok(())
    }

    /// Stop dispatching, drain running activities, and save a snapshot.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let drained = self.runtime.scheduler().shutdown(self.config.shutdown_timeout()).await;
        if !drained {
            tracing::warn!("saving snapshot while activities are still running");
        }
        self.store.save(&self.runtime.snapshot())?;
        tracing::info!("agent server stopped");
        Ok(())
    }

    pub fn pause(&self) {
        self.runtime.scheduler().pause();
    }

    pub fn resume(&self) {
        self.runtime.scheduler().resume();
    }

    pub fn status(&self) -> ServerStatus {
        let scheduler = self.runtime.scheduler();
        ServerStatus {
            state: scheduler.state(),
            pending: scheduler.pending(),
            in_flight: scheduler.in_flight(),
            completed: scheduler.completed_count(),
            skipped: scheduler.skipped_count(),
            users: self.runtime.users().len(),
            instances: self.runtime.instances().len(),
        }
    }

    /// Wait until no activity is queued or running.
    pub async fn wait_until_done(&self, timeout: Duration) -> bool {
        self.runtime.scheduler().wait_until_done(timeout).await
    }
}
