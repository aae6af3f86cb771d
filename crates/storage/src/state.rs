// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serializable image of every registry the agent server owns.

use ag_core::{
    AgentDefinition, ConditionStatus, History, InstanceId, ScriptRun, SymbolTable, TimerStatus,
    User,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Users, definitions, and instances at the moment of shutdown.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub definitions: Vec<AgentDefinition>,
    #[serde(default)]
    pub instances: Vec<InstanceRecord>,
}

impl PersistedState {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.definitions.is_empty() && self.instances.is_empty()
    }

    pub fn find_instance(&self, user: &str, name: &str) -> Option<&InstanceRecord> {
        self.instances.iter().find(|i| i.user == user && i.name == name)
    }
}

/// Everything needed to rebuild one agent instance.
///
/// Dependents are not stored: they are derived from each instance's
/// `data_sources` when the graph is rebuilt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: InstanceId,
    pub user: String,
    pub name: String,
    pub definition: String,
    pub enabled: bool,
    /// Whether the init script already ran
    #[serde(default)]
    pub initialized: bool,
    /// Created to satisfy a data-source reference rather than by request
    #[serde(default)]
    pub auto_created: bool,
    pub parameters: SymbolTable,
    pub memory: SymbolTable,
    pub outputs: SymbolTable,
    #[serde(default)]
    pub inputs: SymbolTable,
    #[serde(default)]
    pub timers: IndexMap<String, TimerStatus>,
    #[serde(default)]
    pub conditions: IndexMap<String, ConditionStatus>,
    /// Input name → upstream instance satisfying it
    #[serde(default)]
    pub data_sources: IndexMap<String, InstanceId>,
    pub history: History,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<ScriptRun>,
}
