// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Units of deferred work owned by the scheduler.

use crate::instance::AgentInstance;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// What an activity does when it runs.
///
/// Periodic kinds carry the interval they were armed with and the
/// generation of the timer or condition status at arming time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityKind {
    /// Run the `init` script on first enable
    Init,
    Timer { name: String, generation: u64, interval: Duration },
    Condition { name: String, generation: u64, interval: Duration },
    /// Run the `inputs_changed` script after a throttled input update
    InputsChanged,
}

ag_core::simple_display! {
    ActivityKind {
        Init => "init",
        Timer { .. } => "timer",
        Condition { .. } => "condition",
        InputsChanged => "inputs_changed",
    }
}

impl ActivityKind {
    pub fn interval(&self) -> Option<Duration> {
        match self {
            Self::Timer { interval, .. } | Self::Condition { interval, .. } => Some(*interval),
            Self::Init | Self::InputsChanged => None,
        }
    }

    pub fn is_periodic(&self) -> bool {
        self.interval().is_some()
    }
}

/// A unit of work bound to one agent instance.
#[derive(Clone)]
pub struct Activity {
    pub instance: Arc<AgentInstance>,
    pub due: Instant,
    pub kind: ActivityKind,
}

impl Activity {
    pub fn new(instance: Arc<AgentInstance>, due: Instant, kind: ActivityKind) -> Self {
        Self { instance, due, kind }
    }

    /// Human-readable label, e.g. `timer timer-1 on alice/counter-1`.
    pub fn description(&self) -> String {
        match &self.kind {
            ActivityKind::Timer { name, .. } | ActivityKind::Condition { name, .. } => {
                format!("{} {} on {}", self.kind, name, self.instance.label())
            }
            kind => format!("{} on {}", kind, self.instance.label()),
        }
    }

    /// The same periodic activity, due one interval after `fired_at`.
    pub fn next_occurrence(&self, fired_at: Instant) -> Option<Activity> {
        let due = fired_at.checked_add(self.kind.interval()?)?;
        Some(Activity {
            instance: Arc::clone(&self.instance),
            due,
            kind: self.kind.clone(),
        })
    }
}

impl fmt::Debug for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activity")
            .field("instance", self.instance.id())
            .field("due", &self.due)
            .field("kind", &self.kind)
            .finish()
    }
}
