// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A running agent instance and its busy lock.
//!
//! Mutable state sits behind a short-lived `parking_lot` mutex that is never
//! held across an await. The busy lock is a separate async mutex held for the
//! whole of a script run, so at most one script runs per instance at a time.

use crate::script::ScriptContext;
use ag_core::{
    table_to_value, AgentDefinition, AgentState, ConditionStatus, ExceptionRecord, History,
    InstanceId, OutputRecord, ScriptRun, SymbolTable, TimerStatus, Value,
};
use ag_storage::InstanceRecord;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;

/// Proof that the holder owns an instance's busy lock.
#[derive(Debug)]
pub struct BusyGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Mutable part of an agent instance.
#[derive(Debug, Clone)]
pub(crate) struct InstanceState {
    pub(crate) enabled: bool,
    pub(crate) initialized: bool,
    pub(crate) parameters: SymbolTable,
    pub(crate) memory: SymbolTable,
    pub(crate) outputs: SymbolTable,
    pub(crate) inputs: SymbolTable,
    pub(crate) timers: IndexMap<String, TimerStatus>,
    pub(crate) conditions: IndexMap<String, ConditionStatus>,
    /// Input name → upstream instance
    pub(crate) data_sources: IndexMap<String, InstanceId>,
    pub(crate) history: History,
    pub(crate) last_run: Option<ScriptRun>,
    /// Last time an input change triggered `inputs_changed`
    pub(crate) last_trigger: Option<Instant>,
    /// Due time of the queued run that picks up changes buffered in the window
    pub(crate) trailing_due: Option<Instant>,
}

pub struct AgentInstance {
    id: InstanceId,
    user: String,
    name: String,
    definition: Arc<AgentDefinition>,
    auto_created: bool,
    busy: Arc<tokio::sync::Mutex<()>>,
    state: Mutex<InstanceState>,
}

impl AgentInstance {
    /// Create a disabled instance with initial tables and the creation snapshot.
    pub(crate) fn new(
        user: impl Into<String>,
        name: impl Into<String>,
        definition: Arc<AgentDefinition>,
        parameters: SymbolTable,
        auto_created: bool,
        now_ms: u64,
    ) -> Self {
        let memory = definition.initial_memory();
        let outputs = definition.initial_outputs();
        let history = History::new(&parameters, &memory, &outputs, now_ms);
        let timers = definition
            .timers
            .iter()
            .map(|t| (t.name.clone(), TimerStatus::new(t.enabled)))
            .collect();
        let conditions = definition
            .conditions
            .iter()
            .map(|c| (c.name.clone(), ConditionStatus::new(c.enabled)))
            .collect();
        let state = InstanceState {
            enabled: false,
            initialized: false,
            parameters,
            memory,
            outputs,
            inputs: SymbolTable::new(),
            timers,
            conditions,
            data_sources: IndexMap::new(),
            history,
            last_run: None,
            last_trigger: None,
            trailing_due: None,
        };
        Self {
            id: InstanceId::new(),
            user: user.into(),
            name: name.into(),
            definition,
            auto_created,
            busy: Arc::new(tokio::sync::Mutex::new(())),
            state: Mutex::new(state),
        }
    }

    /// Rebuild an instance from its persisted record.
    ///
    /// Timers and conditions added to the definition since the snapshot get
    /// fresh statuses; statuses for removed ones are dropped.
    pub(crate) fn from_record(record: InstanceRecord, definition: Arc<AgentDefinition>) -> Self {
        let InstanceRecord {
            id,
            user,
            name,
            enabled,
            initialized,
            auto_created,
            parameters,
            memory,
            outputs,
            inputs,
            mut timers,
            mut conditions,
            data_sources,
            history,
            last_run,
            ..
        } = record;
        let timers = definition
            .timers
            .iter()
            .map(|t| {
                let status =
                    timers.shift_remove(&t.name).unwrap_or_else(|| TimerStatus::new(t.enabled));
                (t.name.clone(), status)
            })
            .collect();
        let conditions = definition
            .conditions
            .iter()
            .map(|c| {
                let status = conditions
                    .shift_remove(&c.name)
                    .unwrap_or_else(|| ConditionStatus::new(c.enabled));
                (c.name.clone(), status)
            })
            .collect();
        let state = InstanceState {
            enabled,
            initialized,
            parameters,
            memory,
            outputs,
            inputs,
            timers,
            conditions,
            data_sources,
            history,
            last_run,
            last_trigger: None,
            trailing_due: None,
        };
        Self {
            id,
            user,
            name,
            definition,
            auto_created,
            busy: Arc::new(tokio::sync::Mutex::new(())),
            state: Mutex::new(state),
        }
    }

    pub(crate) fn to_record(&self) -> InstanceRecord {
        let s = self.state.lock();
        InstanceRecord {
            id: self.id.clone(),
            user: self.user.clone(),
            name: self.name.clone(),
            definition: self.definition.name.clone(),
            enabled: s.enabled,
            initialized: s.initialized,
            auto_created: self.auto_created,
            parameters: s.parameters.clone(),
            memory: s.memory.clone(),
            outputs: s.outputs.clone(),
            inputs: s.inputs.clone(),
            timers: s.timers.clone(),
            conditions: s.conditions.clone(),
            data_sources: s.data_sources.clone(),
            history: s.history.clone(),
            last_run: s.last_run.clone(),
        }
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `user/name`, used in logs and activity descriptions.
    pub fn label(&self) -> String {
        format!("{}/{}", self.user, self.name)
    }

    pub fn definition(&self) -> &Arc<AgentDefinition> {
        &self.definition
    }

    /// Whether this instance was created to satisfy another's input.
    pub fn is_auto_created(&self) -> bool {
        self.auto_created
    }

    // Busy lock

    /// Claim the busy lock without waiting.
    pub fn try_claim(&self) -> Option<BusyGuard> {
        Arc::clone(&self.busy).try_lock_owned().ok().map(|guard| BusyGuard { _guard: guard })
    }

    /// Wait for the busy lock.
    pub async fn claim(&self) -> BusyGuard {
        BusyGuard { _guard: Arc::clone(&self.busy).lock_owned().await }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.try_lock().is_err()
    }

    // State access

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&InstanceState) -> R) -> R {
        f(&self.state.lock())
    }

    pub(crate) fn with_state_mut<R>(&self, f: impl FnOnce(&mut InstanceState) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub fn parameters(&self) -> SymbolTable {
        self.state.lock().parameters.clone()
    }

    pub fn memory(&self) -> SymbolTable {
        self.state.lock().memory.clone()
    }

    pub fn outputs(&self) -> SymbolTable {
        self.state.lock().outputs.clone()
    }

    pub fn inputs(&self) -> SymbolTable {
        self.state.lock().inputs.clone()
    }

    /// Outputs as a single value, the shape dependents see as an input.
    pub fn outputs_value(&self) -> Value {
        table_to_value(&self.state.lock().outputs)
    }

    pub fn timer_status(&self, name: &str) -> Option<TimerStatus> {
        self.state.lock().timers.get(name).cloned()
    }

    pub fn condition_status(&self, name: &str) -> Option<ConditionStatus> {
        self.state.lock().conditions.get(name).cloned()
    }

    /// Input name → upstream instance id.
    pub fn data_source_ids(&self) -> IndexMap<String, InstanceId> {
        self.state.lock().data_sources.clone()
    }

    pub fn history(&self) -> History {
        self.state.lock().history.clone()
    }

    pub fn state_history(&self) -> Vec<AgentState> {
        self.state.lock().history.states.clone()
    }

    pub fn output_history(&self) -> Vec<OutputRecord> {
        self.state.lock().history.outputs.clone()
    }

    pub fn exceptions(&self) -> Vec<ExceptionRecord> {
        self.state.lock().history.exceptions.iter().cloned().collect()
    }

    pub fn last_run(&self) -> Option<ScriptRun> {
        self.state.lock().last_run.clone()
    }

    /// Copy the symbol tables into a fresh script context.
    pub(crate) fn script_context(&self) -> ScriptContext {
        let s = self.state.lock();
        ScriptContext::new(self.id.clone(), &self.user, &self.name, &self.definition.name)
            .with_tables(
                s.parameters.clone(),
                s.memory.clone(),
                s.outputs.clone(),
                s.inputs.clone(),
            )
    }
}

impl std::fmt::Debug for AgentInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentInstance")
            .field("id", &self.id)
            .field("user", &self.user)
            .field("name", &self.name)
            .field("definition", &self.definition.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
