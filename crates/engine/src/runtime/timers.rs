// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer arming, firing, and enable/disable.

use super::Runtime;
use crate::activity::{Activity, ActivityKind};
use crate::error::EngineError;
use crate::instance::AgentInstance;
use crate::scheduler::Outcome;
use crate::script::ScriptRunner;
use ag_core::{as_interval_ms, AgentTimer, Clock, Interval, TimerStatus, MAX_INTERVAL_MS};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

impl<R: ScriptRunner, C: Clock> Runtime<R, C> {
    pub(super) async fn arm_timers(&self, instance: &Arc<AgentInstance>) {
        let definition = Arc::clone(instance.definition());
        for timer in &definition.timers {
            if let Err(e) = self.arm_timer(instance, timer).await {
                tracing::warn!(
                    instance = %instance.label(),
                    timer = %timer.name,
                    error = %e,
                    "timer not armed",
                );
            }
        }
    }

    /// Schedule the first occurrence of an enabled timer on an enabled instance.
    async fn arm_timer(
        &self,
        instance: &Arc<AgentInstance>,
        timer: &AgentTimer,
    ) -> Result<(), EngineError> {
        let armable = instance
            .with_state(|s| s.enabled && s.timers.get(&timer.name).is_some_and(|t| t.enabled));
        if !armable {
            return Ok(());
        }
        let interval =
            self.resolve_interval(instance, "timer", &timer.name, &timer.interval).await?;
        let due_ms = self.clock.epoch_ms().saturating_add(interval.as_millis() as u64);
        let generation = instance.with_state_mut(|s| {
            let status = s.timers.get_mut(&timer.name).filter(|t| t.enabled)?;
            let generation = status.arm();
            status.next_due_ms = Some(due_ms);
            Some(generation)
        });
        if let Some(generation) = generation {
            tracing::debug!(
                instance = %instance.label(),
                timer = %timer.name,
                ?interval,
                "timer armed",
            );
            let kind = ActivityKind::Timer { name: timer.name.clone(), generation, interval };
            self.schedule(instance, Instant::now() + interval, kind);
        }
        Ok(())
    }

    /// Enable a timer and, if its instance is enabled, arm it.
    pub async fn enable_timer(
        &self,
        instance: &Arc<AgentInstance>,
        name: &str,
    ) -> Result<(), EngineError> {
        let definition = Arc::clone(instance.definition());
        let timer =
            definition.find_timer(name).ok_or_else(|| self.unknown_timer(instance, name))?;
        let newly_enabled = instance.with_state_mut(|s| {
            let status = s.timers.entry(name.to_string()).or_default();
            let was = status.enabled;
            status.enabled = true;
            !was
        });
        if newly_enabled {
            tracing::info!(instance = %instance.label(), timer = name, "timer enabled");
            self.arm_timer(instance, timer).await?;
        }
        Ok(())
    }

    /// Disable a timer. A firing already in progress completes and counts.
    pub fn disable_timer(
        &self,
        instance: &AgentInstance,
        name: &str,
    ) -> Result<(), EngineError> {
        let found = instance.with_state_mut(|s| {
            s.timers.get_mut(name).map(|status| {
                status.enabled = false;
                status.disarm();
            })
        });
        match found {
            Some(()) => {
                tracing::info!(instance = %instance.label(), timer = name, "timer disabled");
                Ok(())
            }
            None => Err(self.unknown_timer(instance, name)),
        }
    }

    pub fn timer_status(
        &self,
        instance: &AgentInstance,
        name: &str,
    ) -> Result<TimerStatus, EngineError> {
        instance.timer_status(name).ok_or_else(|| self.unknown_timer(instance, name))
    }

    fn unknown_timer(&self, instance: &AgentInstance, name: &str) -> EngineError {
        EngineError::UnknownTimer {
            definition: instance.definition().name.clone(),
            timer: name.to_string(),
        }
    }

    /// Run a due timer occurrence and schedule the next one.
    pub(super) async fn fire_timer(
        &self,
        activity: &Activity,
        name: &str,
        generation: u64,
    ) -> Outcome {
        let instance = &activity.instance;
        let live = instance
            .with_state(|s| s.enabled && s.timers.get(name).is_some_and(|t| t.is_live(generation)));
        if !live {
            tracing::trace!(instance = %instance.label(), timer = name, "stale occurrence");
            return Outcome::NoOp;
        }
        let Some(timer) = instance.definition().find_timer(name) else {
            return Outcome::NoOp;
        };
        let fired_at = Instant::now();
        self.execute(instance, &format!("timer:{name}"), &timer.script, &[]).await;
        instance.with_state_mut(|s| {
            if let Some(status) = s.timers.get_mut(name) {
                status.hits += 1;
            }
        });
        Outcome::Ran { next: self.rearm(activity, fired_at) }
    }

    /// Next occurrence of a periodic activity, if its timer or condition is
    /// still live. Records the new due time on the status.
    pub(super) fn rearm(&self, activity: &Activity, fired_at: Instant) -> Option<Activity> {
        let next = activity.next_occurrence(fired_at)?;
        let wait = next.due.saturating_duration_since(Instant::now());
        let due_ms = self.clock.epoch_ms().saturating_add(wait.as_millis() as u64);
        let live = activity.instance.with_state_mut(|s| {
            if !s.enabled {
                return false;
            }
            match &activity.kind {
                ActivityKind::Timer { name, generation, .. } => s
                    .timers
                    .get_mut(name)
                    .filter(|t| t.is_live(*generation))
                    .map(|t| t.next_due_ms = Some(due_ms))
                    .is_some(),
                ActivityKind::Condition { name, generation, .. } => s
                    .conditions
                    .get_mut(name)
                    .filter(|c| c.is_live(*generation))
                    .map(|c| c.next_check_ms = Some(due_ms))
                    .is_some(),
                ActivityKind::Init | ActivityKind::InputsChanged => false,
            }
        });
        live.then_some(next)
    }

    /// Resolve a literal or expression interval.
    ///
    /// Expressions are evaluated once, when the timer or condition is armed,
    /// holding the instance's busy lock like any other script run.
    pub(super) async fn resolve_interval(
        &self,
        instance: &Arc<AgentInstance>,
        what: &'static str,
        name: &str,
        interval: &Interval,
    ) -> Result<Duration, EngineError> {
        let bad =
            |reason: String| EngineError::BadInterval { what, name: name.to_string(), reason };
        match interval {
            Interval::Millis(0) => Err(bad("interval is zero".to_string())),
            Interval::Millis(ms) if *ms > MAX_INTERVAL_MS => {
                Err(bad(format!("{ms}ms exceeds {MAX_INTERVAL_MS}ms")))
            }
            Interval::Millis(ms) => Ok(Duration::from_millis(*ms)),
            Interval::Expression(expr) => {
                let label = format!("{what}:{name}:interval");
                let value = {
                    let _busy = instance.claim().await;
                    self.evaluate_expression(instance, &label, expr).await
                }
                .map_err(|e| bad(e.to_string()))?;
                match as_interval_ms(&value) {
                    Some(ms) => Ok(Duration::from_millis(ms)),
                    None => {
                        let reason = format!("expression returned {value}");
                        self.record_exception(instance, &label, &reason);
                        Err(bad(reason))
                    }
                }
            }
        }
    }
}
