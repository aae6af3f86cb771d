// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-instance status of timers and conditions.
//!
//! Each arm of a timer or condition bumps its generation. Scheduled
//! occurrences carry the generation they were armed with, so an occurrence
//! left in the queue by an earlier enable/disable cycle is recognised as
//! stale when dispatched instead of firing twice.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerStatus {
    pub enabled: bool,
    /// Epoch ms the next occurrence is due (None while disarmed)
    #[serde(default)]
    pub next_due_ms: Option<u64>,
    /// Times the timer fired and its script ran
    #[serde(default)]
    pub hits: u64,
    #[serde(skip)]
    pub generation: u64,
}

impl TimerStatus {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, ..Self::default() }
    }

    /// Start a new arming cycle and return its generation.
    pub fn arm(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Whether an occurrence armed at `generation` may still fire.
    pub fn is_live(&self, generation: u64) -> bool {
        self.enabled && self.generation == generation
    }

    pub fn disarm(&mut self) {
        self.generation += 1;
        self.next_due_ms = None;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionStatus {
    pub enabled: bool,
    /// Epoch ms of the next poll (None while disarmed)
    #[serde(default)]
    pub next_check_ms: Option<u64>,
    /// Times the condition expression was evaluated
    #[serde(default)]
    pub check_hits: u64,
    /// Times the expression was true and the script ran
    #[serde(default)]
    pub hits: u64,
    #[serde(skip)]
    pub generation: u64,
}

impl ConditionStatus {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, ..Self::default() }
    }

    pub fn arm(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn is_live(&self, generation: u64) -> bool {
        self.enabled && self.generation == generation
    }

    pub fn disarm(&mut self) {
        self.generation += 1;
        self.next_check_ms = None;
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
