// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State, output, and exception history of an agent instance.

use crate::value::{SymbolTable, Value};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Snapshot of the outputs, taken whenever they change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub seq: u64,
    pub time_ms: u64,
    pub outputs: SymbolTable,
}

/// Full snapshot of an instance's symbol tables, taken after every script run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub seq: u64,
    pub time_ms: u64,
    pub parameters: SymbolTable,
    pub memory: SymbolTable,
    pub outputs: SymbolTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptStatus {
    Ok,
    Failed,
}

crate::simple_display! {
    ScriptStatus {
        Ok => "ok",
        Failed => "failed",
    }
}

/// Outcome of the most recent script run of an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRun {
    pub script: String,
    pub status: ScriptStatus,
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
    #[serde(default)]
    pub return_value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A script failure retained for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    pub time_ms: u64,
    pub script: String,
    pub message: String,
}

/// Append-only history of one instance.
///
/// States and output records share one sequence counter, so an output record
/// carries the sequence number of the state snapshot it was taken with.
/// Sequence 0 is the snapshot taken when the instance was created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub states: Vec<AgentState>,
    pub outputs: Vec<OutputRecord>,
    #[serde(default)]
    pub exceptions: VecDeque<ExceptionRecord>,
    pub next_seq: u64,
}

impl History {
    /// Start a history with the creation snapshot.
    pub fn new(
        parameters: &SymbolTable,
        memory: &SymbolTable,
        outputs: &SymbolTable,
        time_ms: u64,
    ) -> Self {
        let mut history = Self::default();
        history.push_state(parameters, memory, outputs, time_ms);
        history.push_output(outputs, 0, time_ms);
        history
    }

    /// Append the snapshot taken after a script run.
    ///
    /// Always appends an [`AgentState`]; appends an [`OutputRecord`] only when
    /// `outputs` differ from the latest recorded outputs. Returns whether an
    /// output record was appended.
    pub fn record(
        &mut self,
        parameters: &SymbolTable,
        memory: &SymbolTable,
        outputs: &SymbolTable,
        time_ms: u64,
    ) -> bool {
        let seq = self.push_state(parameters, memory, outputs, time_ms);
        let changed = self.latest_outputs() != Some(outputs);
        if changed {
            self.push_output(outputs, seq, time_ms);
        }
        changed
    }

    /// Retain a script failure, dropping the oldest beyond `limit`.
    pub fn record_exception(&mut self, exception: ExceptionRecord, limit: usize) {
        self.exceptions.push_back(exception);
        while self.exceptions.len() > limit {
            self.exceptions.pop_front();
        }
    }

    pub fn latest_outputs(&self) -> Option<&SymbolTable> {
        self.outputs.last().map(|r| &r.outputs)
    }

    pub fn latest_state(&self) -> Option<&AgentState> {
        self.states.last()
    }

    fn push_state(
        &mut self,
        parameters: &SymbolTable,
        memory: &SymbolTable,
        outputs: &SymbolTable,
        time_ms: u64,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.states.push(AgentState {
            seq,
            time_ms,
            parameters: parameters.clone(),
            memory: memory.clone(),
            outputs: outputs.clone(),
        });
        seq
    }

    fn push_output(&mut self, outputs: &SymbolTable, seq: u64, time_ms: u64) {
        self.outputs.push(OutputRecord { seq, time_ms, outputs: outputs.clone() });
    }
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;
