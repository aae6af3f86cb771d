// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent runtime: registries plus the behavior of every activity kind.

mod conditions;
mod data_sources;
mod execute;
mod handler;
mod timers;

use crate::activity::{Activity, ActivityKind};
use crate::error::EngineError;
use crate::instance::AgentInstance;
use crate::registry::Registry;
use crate::scheduler::Scheduler;
use crate::script::ScriptRunner;
use ag_core::{AgentDefinition, Clock, InstanceId, SymbolTable, User, INIT_SCRIPT};
use ag_storage::PersistedState;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;

/// Options for [`Runtime::instantiate`].
#[derive(Debug, Clone)]
pub struct InstanceOptions {
    /// Defaults to `{definition}-{n}`
    pub name: Option<String>,
    pub parameters: SymbolTable,
    /// Enable right away (subject to the definition's own `enabled` flag)
    pub enable: bool,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self { name: None, parameters: SymbolTable::new(), enable: true }
    }
}

impl InstanceOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<ag_core::Value>,
    ) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    ag_core::setters! {
        set { enable: bool }
    }
}

/// Runtime tunables not owned by the scheduler.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub exception_history_limit: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { exception_history_limit: 100 }
    }
}

/// Owns the registries and performs activities for the scheduler.
pub struct Runtime<R: ScriptRunner, C: Clock> {
    registry: Mutex<Registry>,
    scheduler: Scheduler,
    runner: R,
    clock: C,
    config: RuntimeConfig,
}

impl<R: ScriptRunner, C: Clock> Runtime<R, C> {
    pub fn new(runner: R, clock: C, scheduler: Scheduler, config: RuntimeConfig) -> Self {
        Self { registry: Mutex::new(Registry::default()), scheduler, runner, clock, config }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn schedule(&self, instance: &Arc<AgentInstance>, due: Instant, kind: ActivityKind) {
        if let Err(e) = self.scheduler.add(Activity::new(Arc::clone(instance), due, kind)) {
            tracing::debug!(instance = %instance.label(), error = %e, "activity not scheduled");
        }
    }

    // Users and definitions

    pub fn create_user(&self, id: impl Into<String>) -> Result<User, EngineError> {
        let user = User::new(id, self.clock.epoch_ms());
        self.registry.lock().add_user(user.clone())?;
        tracing::info!(user = %user.id, "user created");
        Ok(user)
    }

    pub fn users(&self) -> Vec<User> {
        self.registry.lock().users().cloned().collect()
    }

    pub fn register_definition(
        &self,
        definition: AgentDefinition,
    ) -> Result<Arc<AgentDefinition>, EngineError> {
        let definition = self.registry.lock().add_definition(definition)?;
        tracing::info!(
            user = %definition.user,
            definition = %definition.name,
            "definition registered",
        );
        Ok(definition)
    }

    pub fn definition(&self, user: &str, name: &str) -> Result<Arc<AgentDefinition>, EngineError> {
        self.registry.lock().definition(user, name)
    }

    pub fn remove_definition(&self, user: &str, name: &str) -> Result<(), EngineError> {
        self.registry.lock().remove_definition(user, name)
    }

    // Instances

    pub fn instance(&self, user: &str, name: &str) -> Result<Arc<AgentInstance>, EngineError> {
        self.registry.lock().find_instance(user, name)
    }

    pub fn instance_by_id(&self, id: &InstanceId) -> Option<Arc<AgentInstance>> {
        self.registry.lock().instance(id)
    }

    pub fn instances(&self) -> Vec<Arc<AgentInstance>> {
        self.registry.lock().instances().cloned().collect()
    }

    /// Create an instance of `user`'s definition, resolving its data sources.
    ///
    /// Upstream instances created along the way are enabled when their
    /// definitions are; the new instance is enabled when `options.enable`
    /// and its definition allow it.
    pub async fn instantiate(
        &self,
        user: &str,
        definition: &str,
        options: InstanceOptions,
    ) -> Result<Arc<AgentInstance>, EngineError> {
        let (instance, created) = {
            let mut reg = self.registry.lock();
            let definition = reg.definition(user, definition)?;
            let name = match options.name {
                Some(name) => name,
                None => reg.next_instance_name(user, &definition.name),
            };
            let parameters = definition.resolve_parameters(&options.parameters)?;
            let instance = Arc::new(AgentInstance::new(
                user,
                name,
                definition,
                parameters,
                false,
                self.clock.epoch_ms(),
            ));
            reg.insert_instance(Arc::clone(&instance))?;
            let mut created = Vec::new();
            if let Err(e) = self.resolve_data_sources(&mut reg, &instance, &mut created) {
                self.discard(&mut reg, &instance, &created);
                return Err(e);
            }
            (instance, created)
        };
        tracing::info!(instance = %instance.label(), id = %instance.id(), "instance created");

        for upstream in &created {
            if upstream.definition().enabled {
                self.activate(upstream).await;
            }
        }
        if options.enable && instance.definition().enabled {
            self.activate(&instance).await;
        }
        Ok(instance)
    }

    /// Enable an instance: run `init` on first enable and arm its timers
    /// and conditions. No-op if already enabled.
    pub async fn enable(&self, instance: &Arc<AgentInstance>) -> Result<(), EngineError> {
        if instance.is_enabled() {
            return Ok(());
        }
        let created = {
            let mut reg = self.registry.lock();
            let mut created = Vec::new();
            self.resolve_data_sources(&mut reg, instance, &mut created)?;
            created
        };
        for upstream in &created {
            if upstream.definition().enabled {
                self.activate(upstream).await;
            }
        }
        self.activate(instance).await;
        Ok(())
    }

    /// Disable an instance. Queued activities become no-ops; one already
    /// running completes.
    pub fn disable(&self, instance: &Arc<AgentInstance>) {
        let was_enabled = instance.with_state_mut(|s| {
            let was = s.enabled;
            s.enabled = false;
            s.timers.values_mut().for_each(|t| t.disarm());
            s.conditions.values_mut().for_each(|c| c.disarm());
            s.trailing_due = None;
            was
        });
        if was_enabled {
            tracing::info!(instance = %instance.label(), "instance disabled");
        }
    }

    /// Mark enabled, schedule `init` if it never ran, and arm everything.
    async fn activate(&self, instance: &Arc<AgentInstance>) {
        let needs_init = instance.with_state_mut(|s| {
            s.enabled = true;
            !s.initialized
        });
        if needs_init && instance.definition().find_script(INIT_SCRIPT).is_some() {
            self.schedule(instance, Instant::now(), ActivityKind::Init);
        } else if needs_init {
            instance.with_state_mut(|s| s.initialized = true);
        }
        self.arm_timers(instance).await;
        self.arm_conditions(instance).await;
        tracing::info!(instance = %instance.label(), "instance enabled");
    }

    /// Release an instance and any auto-created upstreams left unreferenced.
    ///
    /// Fails while other instances still depend on it. Returns the ids of
    /// every released instance, the requested one first.
    pub fn release(&self, instance: &Arc<AgentInstance>) -> Result<Vec<InstanceId>, EngineError> {
        let mut reg = self.registry.lock();
        if reg.instance(instance.id()).is_none() {
            return Err(EngineError::UnknownInstance {
                user: instance.user().to_string(),
                name: instance.name().to_string(),
            });
        }
        let count = reg.graph.dependent_count(instance.id());
        if count > 0 {
            return Err(EngineError::HasDependents { instance: instance.label(), count });
        }

        let mut released = Vec::new();
        let mut pending = vec![Arc::clone(instance)];
        while let Some(current) = pending.pop() {
            self.disable(&current);
            reg.remove_instance(current.id());
            for upstream_id in current.data_source_ids().values() {
                let orphaned = reg.graph.remove_edge(upstream_id, current.id());
                if let Some(upstream) = reg.instance(upstream_id) {
                    if orphaned && upstream.is_auto_created() {
                        pending.push(upstream);
                    }
                }
            }
            tracing::info!(instance = %current.label(), "instance released");
            released.push(current.id().clone());
        }
        Ok(released)
    }

    /// Upstream instances by input name.
    pub fn data_source_instances(
        &self,
        instance: &AgentInstance,
    ) -> IndexMap<String, Arc<AgentInstance>> {
        let reg = self.registry.lock();
        instance
            .data_source_ids()
            .into_iter()
            .filter_map(|(input, id)| reg.instance(&id).map(|upstream| (input, upstream)))
            .collect()
    }

    /// Instances consuming this instance's outputs.
    pub fn dependent_instances(&self, instance: &AgentInstance) -> Vec<Arc<AgentInstance>> {
        self.registry.lock().dependents(instance.id())
    }

    // Persistence

    /// Capture every registry for the snapshot store.
    pub fn snapshot(&self) -> PersistedState {
        let reg = self.registry.lock();
        PersistedState {
            users: reg.users().cloned().collect(),
            definitions: reg.definitions().map(|d| d.as_ref().clone()).collect(),
            instances: reg.instances().map(|i| i.to_record()).collect(),
        }
    }

    /// Rebuild registries and the dependency graph from a snapshot.
    ///
    /// Nothing is scheduled; call [`Runtime::resume_instances`] once the
    /// scheduler is running.
    pub fn restore(&self, state: PersistedState) -> Result<(), EngineError> {
        let mut reg = self.registry.lock();
        for user in state.users {
            reg.add_user(user)?;
        }
        for definition in state.definitions {
            reg.restore_definition(definition);
        }
        let mut restored = Vec::with_capacity(state.instances.len());
        for record in state.instances {
            let definition = reg.definition(&record.user, &record.definition)?;
            let instance = Arc::new(AgentInstance::from_record(record, definition));
            reg.insert_instance(Arc::clone(&instance))?;
            restored.push(instance);
        }
        for instance in &restored {
            for upstream in instance.data_source_ids().values() {
                reg.graph.add_edge(upstream, instance.id());
            }
        }
        tracing::info!(instances = restored.len(), "registries restored");
        Ok(())
    }

    /// Re-arm every enabled instance after a restore.
    pub async fn resume_instances(&self) {
        let enabled: Vec<Arc<AgentInstance>> =
            self.instances().into_iter().filter(|i| i.is_enabled()).collect();
        for instance in &enabled {
            self.activate(instance).await;
        }
    }

    fn discard(
        &self,
        reg: &mut Registry,
        instance: &Arc<AgentInstance>,
        created: &[Arc<AgentInstance>],
    ) {
        for inst in std::iter::once(instance).chain(created.iter()) {
            for upstream in inst.data_source_ids().values() {
                reg.graph.remove_edge(upstream, inst.id());
            }
            reg.remove_instance(inst.id());
        }
    }
}
