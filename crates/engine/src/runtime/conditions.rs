// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Condition polling.

use super::Runtime;
use crate::activity::{Activity, ActivityKind};
use crate::error::EngineError;
use crate::instance::AgentInstance;
use crate::scheduler::Outcome;
use crate::script::ScriptRunner;
use ag_core::{is_truthy, AgentCondition, Clock, ConditionStatus};
use std::sync::Arc;
use tokio::time::Instant;

impl<R: ScriptRunner, C: Clock> Runtime<R, C> {
    pub(super) async fn arm_conditions(&self, instance: &Arc<AgentInstance>) {
        let definition = Arc::clone(instance.definition());
        for condition in &definition.conditions {
            if let Err(e) = self.arm_condition(instance, condition).await {
                tracing::warn!(
                    instance = %instance.label(),
                    condition = %condition.name,
                    error = %e,
                    "condition not armed",
                );
            }
        }
    }

    async fn arm_condition(
        &self,
        instance: &Arc<AgentInstance>,
        condition: &AgentCondition,
    ) -> Result<(), EngineError> {
        let armable = instance.with_state(|s| {
            s.enabled && s.conditions.get(&condition.name).is_some_and(|c| c.enabled)
        });
        if !armable {
            return Ok(());
        }
        let interval = self
            .resolve_interval(instance, "condition", &condition.name, &condition.interval)
            .await?;
        let due_ms = self.clock.epoch_ms().saturating_add(interval.as_millis() as u64);
        let generation = instance.with_state_mut(|s| {
            let status = s.conditions.get_mut(&condition.name).filter(|c| c.enabled)?;
            let generation = status.arm();
            status.next_check_ms = Some(due_ms);
            Some(generation)
        });
        if let Some(generation) = generation {
            let kind =
                ActivityKind::Condition { name: condition.name.clone(), generation, interval };
            self.schedule(instance, Instant::now() + interval, kind);
        }
        Ok(())
    }

    pub async fn enable_condition(
        &self,
        instance: &Arc<AgentInstance>,
        name: &str,
    ) -> Result<(), EngineError> {
        let definition = Arc::clone(instance.definition());
        let condition =
            definition.find_condition(name).ok_or_else(|| self.unknown_condition(instance, name))?;
        let newly_enabled = instance.with_state_mut(|s| {
            let status = s.conditions.entry(name.to_string()).or_default();
            let was = status.enabled;
            status.enabled = true;
            !was
        });
        if newly_enabled {
            tracing::info!(instance = %instance.label(), condition = name, "condition enabled");
            self.arm_condition(instance, condition).await?;
        }
        Ok(())
    }

    pub fn disable_condition(
        &self,
        instance: &AgentInstance,
        name: &str,
    ) -> Result<(), EngineError> {
        let found = instance.with_state_mut(|s| {
            s.conditions.get_mut(name).map(|status| {
                status.enabled = false;
                status.disarm();
            })
        });
        match found {
            Some(()) => {
                tracing::info!(
                    instance = %instance.label(),
                    condition = name,
                    "condition disabled",
                );
                Ok(())
            }
            None => Err(self.unknown_condition(instance, name)),
        }
    }

    pub fn condition_status(
        &self,
        instance: &AgentInstance,
        name: &str,
    ) -> Result<ConditionStatus, EngineError> {
        instance.condition_status(name).ok_or_else(|| self.unknown_condition(instance, name))
    }

    fn unknown_condition(&self, instance: &AgentInstance, name: &str) -> EngineError {
        EngineError::UnknownCondition {
            definition: instance.definition().name.clone(),
            condition: name.to_string(),
        }
    }

    /// Poll a condition: count the check, evaluate, and run the script if true.
    ///
    /// Evaluation errors count as false. The condition is always re-armed
    /// while live.
    pub(super) async fn check_condition(
        &self,
        activity: &Activity,
        name: &str,
        generation: u64,
    ) -> Outcome {
        let instance = &activity.instance;
        let live = instance.with_state(|s| {
            s.enabled && s.conditions.get(name).is_some_and(|c| c.is_live(generation))
        });
        if !live {
            tracing::trace!(instance = %instance.label(), condition = name, "stale occurrence");
            return Outcome::NoOp;
        }
        let Some(condition) = instance.definition().find_condition(name) else {
            return Outcome::NoOp;
        };
        let checked_at = Instant::now();
        instance.with_state_mut(|s| {
            if let Some(status) = s.conditions.get_mut(name) {
                status.check_hits += 1;
            }
        });

        let label = format!("condition:{name}");
        let truth = self
            .evaluate_expression(instance, &label, &condition.condition)
            .await
            .is_ok_and(|value| is_truthy(&value));
        if truth {
            instance.with_state_mut(|s| {
                if let Some(status) = s.conditions.get_mut(name) {
                    status.hits += 1;
                }
            });
            self.execute(instance, &label, &condition.script, &[]).await;
        }
        Outcome::Ran { next: self.rearm(activity, checked_at) }
    }
}
