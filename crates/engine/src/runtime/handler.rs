// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler callbacks.

use super::Runtime;
use crate::activity::{Activity, ActivityKind};
use crate::scheduler::{ActivityHandler, Outcome};
use crate::script::ScriptRunner;
use ag_core::{Clock, INIT_SCRIPT, INPUTS_CHANGED_SCRIPT};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const RETRY_DELAY: Duration = Duration::from_millis(10);

#[async_trait]
impl<R: ScriptRunner, C: Clock> ActivityHandler for Runtime<R, C> {
    async fn perform(&self, activity: &Activity) -> Outcome {
        let instance = &activity.instance;
        if !instance.is_enabled() {
            tracing::trace!(activity = %activity.description(), "agent disabled, dropping");
            return Outcome::NoOp;
        }
        match &activity.kind {
            ActivityKind::Init => {
                let first =
                    instance.with_state_mut(|s| !std::mem::replace(&mut s.initialized, true));
                if !first {
                    return Outcome::NoOp;
                }
                self.run_named(instance, INIT_SCRIPT).await;
                Outcome::Ran { next: None }
            }
            ActivityKind::Timer { name, generation, .. } => {
                self.fire_timer(activity, name, *generation).await
            }
            ActivityKind::Condition { name, generation, .. } => {
                self.check_condition(activity, name, *generation).await
            }
            ActivityKind::InputsChanged => {
                let now = Instant::now();
                instance.with_state_mut(|s| {
                    if s.trailing_due.is_some_and(|due| due <= now) {
                        s.trailing_due = None;
                    }
                });
                self.run_named(instance, INPUTS_CHANGED_SCRIPT).await;
                Outcome::Ran { next: None }
            }
        }
    }

    /// Periodic activities re-arm from the skipped firing. One-shots are
    /// retried shortly: `init` runs only once, and a dropped `inputs_changed`
    /// would leave the dependent on stale inputs.
    fn skipped(&self, activity: &Activity) -> Option<Activity> {
        let now = Instant::now();
        match activity.kind {
            ActivityKind::Init | ActivityKind::InputsChanged => {
                let instance = Arc::clone(&activity.instance);
                Some(Activity::new(instance, now + RETRY_DELAY, activity.kind.clone()))
            }
            _ => self.rearm(activity, now),
        }
    }
}
