// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness: a server over a temp state directory.

pub use ag_core::{
    AgentDefinition, AgentTimer, Category, Clock, FakeClock, FieldDecl, FieldType, SymbolTable,
    Value,
};
pub use ag_engine::test_support::*;
pub use ag_engine::{
    AgentInstance, AgentServer, InstanceOptions, Request, Response, SchedulerState, ServerConfig,
};
pub use ag_storage::FileStore;
pub use serde_json::json;
pub use std::sync::Arc;
pub use std::time::Duration;

pub type Server = AgentServer<ScriptTable, FileStore, VirtualClock>;

pub const USER: &str = "alice";

/// Wall clock that moves with tokio's paused clock, so records stamped
/// during a sleep carry distinct times. `base` can be pushed forward by hand.
#[derive(Clone)]
pub struct VirtualClock {
    origin: tokio::time::Instant,
    base: FakeClock,
}

impl Clock for VirtualClock {
    fn epoch_ms(&self) -> u64 {
        self.base.epoch_ms() + self.origin.elapsed().as_millis() as u64
    }
}

/// Owns the state directory, the script table, and the wall clock shared
/// by every server built from it, so a restart sees the same world.
pub struct Project {
    dir: tempfile::TempDir,
    pub scripts: ScriptTable,
    pub clock: FakeClock,
    wall: VirtualClock,
    compress: bool,
}

impl Project {
    pub fn new() -> Self {
        init_tracing();
        let scripts = ScriptTable::new();
        fixture_scripts(&scripts);
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::new();
        let wall = VirtualClock { origin: tokio::time::Instant::now(), base: clock.clone() };
        Self { dir, scripts, clock, wall, compress: false }
    }

    pub fn compressed() -> Self {
        Self { compress: true, ..Self::new() }
    }

    pub fn config(&self) -> ServerConfig {
        let mut config = ServerConfig::for_dir(self.dir.path());
        config.compress_snapshots = self.compress;
        config
    }

    /// A fresh server over this project's snapshot file. Not started.
    pub fn server(&self) -> Server {
        let config = self.config();
        let store = config.file_store();
        AgentServer::with_clock(config, self.scripts.clone(), store, self.wall.clone())
    }

    /// A started server with user `alice` and the given definitions.
    pub async fn started(&self, definitions: Vec<AgentDefinition>) -> Server {
        let server = self.server();
        server.start().await.unwrap();
        let rt = server.runtime();
        rt.create_user(USER).unwrap();
        for definition in definitions {
            rt.register_definition(definition).unwrap();
        }
        server
    }
}

pub async fn instantiate(server: &Server, definition: &str, name: &str) -> Arc<AgentInstance> {
    server.runtime().instantiate(USER, definition, InstanceOptions::named(name)).await.unwrap()
}

pub async fn sleep_ms(n: u64) {
    tokio::time::sleep(Duration::from_millis(n)).await;
}

pub fn int(table: &SymbolTable, name: &str) -> i64 {
    table.get(name).and_then(Value::as_i64).unwrap_or_default()
}

pub fn hits(server: &Server, instance: &AgentInstance, timer: &str) -> u64 {
    server.runtime().timer_status(instance, timer).unwrap().hits
}
