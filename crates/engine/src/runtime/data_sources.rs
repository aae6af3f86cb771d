// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Data-source resolution and throttled input propagation.

use super::Runtime;
use crate::activity::ActivityKind;
use crate::error::EngineError;
use crate::instance::AgentInstance;
use crate::registry::{Registry, SharedKey};
use crate::script::ScriptRunner;
use ag_core::{Clock, InstanceId, Value, INPUTS_CHANGED_SCRIPT};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

impl<R: ScriptRunner, C: Clock> Runtime<R, C> {
    /// Bind every unbound input of `instance` to an upstream instance.
    ///
    /// An existing auto-created upstream with the same user, definition, and
    /// parameters is shared; otherwise one is created and resolved in turn.
    /// New upstreams are appended to `created`, deepest first.
    pub(super) fn resolve_data_sources(
        &self,
        reg: &mut Registry,
        instance: &Arc<AgentInstance>,
        created: &mut Vec<Arc<AgentInstance>>,
    ) -> Result<(), EngineError> {
        let definition = Arc::clone(instance.definition());
        for input in &definition.inputs {
            if instance.with_state(|s| s.data_sources.contains_key(&input.name)) {
                continue;
            }
            let upstream_def = reg.definition(instance.user(), &input.definition)?;
            let parameters = upstream_def.resolve_parameters(&input.parameters)?;
            let key = SharedKey::new(instance.user(), &upstream_def.name, &parameters);
            let upstream = match reg.shared_instance(&key) {
                Some(existing) => existing,
                None => {
                    let name = reg.next_instance_name(instance.user(), &upstream_def.name);
                    let upstream = Arc::new(AgentInstance::new(
                        instance.user(),
                        name,
                        upstream_def,
                        parameters,
                        true,
                        self.clock.epoch_ms(),
                    ));
                    reg.insert_instance(Arc::clone(&upstream))?;
                    self.resolve_data_sources(reg, &upstream, created)?;
                    created.push(Arc::clone(&upstream));
                    tracing::info!(
                        instance = %upstream.label(),
                        dependent = %instance.label(),
                        "upstream instance created",
                    );
                    upstream
                }
            };
            reg.graph.add_edge(upstream.id(), instance.id());
            let snapshot = upstream.outputs_value();
            instance.with_state_mut(|s| {
                s.data_sources.insert(input.name.clone(), upstream.id().clone());
                s.inputs.insert(input.name.clone(), snapshot);
            });
        }
        Ok(())
    }

    /// Push `upstream`'s outputs to every dependent.
    pub(super) fn propagate_outputs(&self, upstream: &Arc<AgentInstance>) {
        let dependents = self.registry.lock().dependents(upstream.id());
        if dependents.is_empty() {
            return;
        }
        let snapshot = upstream.outputs_value();
        for dependent in &dependents {
            self.notify_input_changed(dependent, upstream.id(), &snapshot);
        }
    }

    /// Record a new upstream value on `dependent` and schedule its
    /// `inputs_changed` script.
    ///
    /// Inputs are always updated. A change outside `trigger_interval_ms` of
    /// the last trigger runs the script at once. A change inside the window
    /// queues one trailing run at the end of the window; further changes
    /// before it runs are buffered and the trailing run sees the latest.
    pub fn notify_input_changed(
        &self,
        dependent: &Arc<AgentInstance>,
        upstream: &InstanceId,
        outputs: &Value,
    ) {
        let has_script = dependent.definition().find_script(INPUTS_CHANGED_SCRIPT).is_some();
        let window = Duration::from_millis(dependent.definition().trigger_interval_ms);
        let now = Instant::now();
        let due = dependent.with_state_mut(|s| {
            let mut bound = false;
            for (input, source) in &s.data_sources {
                if source == upstream {
                    s.inputs.insert(input.clone(), outputs.clone());
                    bound = true;
                }
            }
            if !bound || !s.enabled || !has_script || s.trailing_due.is_some() {
                return None;
            }
            let due = match s.last_trigger {
                Some(last) if now.duration_since(last) < window => {
                    let due = last + window;
                    s.trailing_due = Some(due);
                    due
                }
                _ => now,
            };
            s.last_trigger = Some(due);
            Some(due)
        });
        match due {
            Some(due) => self.schedule(dependent, due, ActivityKind::InputsChanged),
            None => tracing::trace!(instance = %dependent.label(), "input change buffered"),
        }
    }
}
