// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Users, definitions, instances, and the dependency graph.

use crate::error::EngineError;
use crate::graph::DependencyGraph;
use crate::instance::AgentInstance;
use ag_core::{AgentDefinition, InstanceId, SymbolTable, User};
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Key under which an upstream instance is shared between dependents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SharedKey {
    user: String,
    definition: String,
    /// Parameters serialized with sorted keys
    parameters: String,
}

impl SharedKey {
    pub(crate) fn new(user: &str, definition: &str, parameters: &SymbolTable) -> Self {
        let sorted: BTreeMap<&String, &ag_core::Value> = parameters.iter().collect();
        Self {
            user: user.to_string(),
            definition: definition.to_string(),
            parameters: serde_json::to_string(&sorted).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    users: IndexMap<String, User>,
    definitions: IndexMap<(String, String), Arc<AgentDefinition>>,
    instances: IndexMap<InstanceId, Arc<AgentInstance>>,
    by_name: HashMap<(String, String), InstanceId>,
    /// Auto-created upstreams available for sharing
    shared: HashMap<SharedKey, InstanceId>,
    pub(crate) graph: DependencyGraph,
}

impl Registry {
    // Users

    pub fn add_user(&mut self, user: User) -> Result<(), EngineError> {
        if self.users.contains_key(&user.id) {
            return Err(EngineError::DuplicateUser(user.id));
        }
        self.users.insert(user.id.clone(), user);
        Ok(())
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    fn require_user(&self, id: &str) -> Result<(), EngineError> {
        if self.users.contains_key(id) {
            Ok(())
        } else {
            Err(EngineError::UnknownUser(id.to_string()))
        }
    }

    // Definitions

    /// Validate and register a definition under its user.
    pub fn add_definition(
        &mut self,
        definition: AgentDefinition,
    ) -> Result<Arc<AgentDefinition>, EngineError> {
        self.require_user(&definition.user)?;
        let key = (definition.user.clone(), definition.name.clone());
        if self.definitions.contains_key(&key) {
            return Err(EngineError::DuplicateDefinition { user: key.0, name: key.1 });
        }
        let user = definition.user.clone();
        definition.validate(|name| {
            self.definitions.get(&(user.clone(), name.to_string())).map(|d| d.as_ref())
        })?;
        let definition = Arc::new(definition);
        self.definitions.insert(key, Arc::clone(&definition));
        Ok(definition)
    }

    /// Insert a definition as persisted, without validation.
    pub(crate) fn restore_definition(&mut self, definition: AgentDefinition) {
        let key = (definition.user.clone(), definition.name.clone());
        self.definitions.insert(key, Arc::new(definition));
    }

    pub fn definition(&self, user: &str, name: &str) -> Result<Arc<AgentDefinition>, EngineError> {
        self.definitions
            .get(&(user.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| EngineError::UnknownDefinition {
                user: user.to_string(),
                name: name.to_string(),
            })
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<AgentDefinition>> {
        self.definitions.values()
    }

    /// Remove a definition no instance or other definition uses.
    ///
    /// Definitions may only reference ones registered before them, so
    /// refusing to remove referenced definitions keeps the input graph acyclic.
    pub fn remove_definition(&mut self, user: &str, name: &str) -> Result<(), EngineError> {
        self.definition(user, name)?;
        let count = self
            .instances
            .values()
            .filter(|i| i.user() == user && i.definition().name == name)
            .count();
        if count > 0 {
            return Err(EngineError::DefinitionInUse {
                user: user.to_string(),
                name: name.to_string(),
                count,
            });
        }
        let referrer = self
            .definitions
            .values()
            .find(|d| d.user == user && d.inputs.iter().any(|input| input.definition == name));
        if let Some(referrer) = referrer {
            return Err(EngineError::DefinitionReferenced {
                user: user.to_string(),
                name: name.to_string(),
                by: referrer.name.clone(),
            });
        }
        self.definitions.shift_remove(&(user.to_string(), name.to_string()));
        Ok(())
    }

    // Instances

    pub fn insert_instance(&mut self, instance: Arc<AgentInstance>) -> Result<(), EngineError> {
        let key = (instance.user().to_string(), instance.name().to_string());
        if self.by_name.contains_key(&key) {
            return Err(EngineError::DuplicateInstance { user: key.0, name: key.1 });
        }
        if instance.is_auto_created() {
            let definition = &instance.definition().name;
            let key = SharedKey::new(instance.user(), definition, &instance.parameters());
            self.shared.insert(key, instance.id().clone());
        }
        self.by_name.insert(key, instance.id().clone());
        self.instances.insert(instance.id().clone(), instance);
        Ok(())
    }

    pub fn remove_instance(&mut self, id: &InstanceId) -> Option<Arc<AgentInstance>> {
        let instance = self.instances.shift_remove(id)?;
        self.by_name.remove(&(instance.user().to_string(), instance.name().to_string()));
        self.shared.retain(|_, shared| shared != id);
        Some(instance)
    }

    pub fn instance(&self, id: &InstanceId) -> Option<Arc<AgentInstance>> {
        self.instances.get(id).cloned()
    }

    pub fn find_instance(&self, user: &str, name: &str) -> Result<Arc<AgentInstance>, EngineError> {
        self.by_name
            .get(&(user.to_string(), name.to_string()))
            .and_then(|id| self.instances.get(id))
            .cloned()
            .ok_or_else(|| EngineError::UnknownInstance {
                user: user.to_string(),
                name: name.to_string(),
            })
    }

    pub(crate) fn shared_instance(&self, key: &SharedKey) -> Option<Arc<AgentInstance>> {
        self.shared.get(key).and_then(|id| self.instance(id))
    }

    pub fn instances(&self) -> impl Iterator<Item = &Arc<AgentInstance>> {
        self.instances.values()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// First free name of the form `{definition}-{n}` for `user`.
    pub fn next_instance_name(&self, user: &str, definition: &str) -> String {
        (1..)
            .map(|n| format!("{definition}-{n}"))
            .find(|name| !self.by_name.contains_key(&(user.to_string(), name.clone())))
            .unwrap_or_else(|| format!("{definition}-{}", InstanceId::new().suffix()))
    }

    pub fn dependents(&self, upstream: &InstanceId) -> Vec<Arc<AgentInstance>> {
        self.graph.dependents(upstream).iter().filter_map(|id| self.instance(id)).collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
