// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent definitions: the immutable template an agent instance is built from.
//!
//! A definition declares the instance's parameter, memory, and output fields,
//! its named scripts, periodic timers and polled conditions, and the
//! data-source inputs it consumes from other agents. Definitions are
//! validated once, when registered, and never change afterwards.

use crate::value::{FieldType, SymbolTable, Value, MAX_INTERVAL_MS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Script run once, the first time an instance is enabled.
pub const INIT_SCRIPT: &str = "init";

/// Script run when a data-source input of the instance changes.
pub const INPUTS_CHANGED_SCRIPT: &str = "inputs_changed";

/// Errors raised while registering a definition or instantiating from one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DefinitionError {
    #[error("{what} name must not be empty")]
    EmptyName { what: &'static str },
    #[error("duplicate {what} name '{name}'")]
    DuplicateName { what: &'static str, name: String },
    #[error("{what} '{name}' has no interval")]
    MissingInterval { what: &'static str, name: String },
    #[error("{what} '{name}' interval exceeds {max}ms", max = MAX_INTERVAL_MS)]
    IntervalTooLong { what: &'static str, name: String },
    #[error("{what} '{name}' has no script")]
    MissingScript { what: &'static str, name: String },
    #[error("condition '{name}' has no condition expression")]
    MissingCondition { name: String },
    #[error("input '{input}' references unknown definition '{definition}'")]
    UnknownDefinition { input: String, definition: String },
    #[error("input '{input}' references its own definition")]
    SelfReference { input: String },
    #[error("definition '{definition}' has no parameter named '{parameter}'")]
    UnknownParameter { definition: String, parameter: String },
    #[error("field '{field}' expects {expected}, got {value}")]
    TypeMismatch { field: String, expected: FieldType, value: Value },
}

/// A declared parameter, memory, or output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: FieldType,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub default: Value,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        Self { name: name.into(), kind, default: Value::Null }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    /// Value the field holds when an instance is created.
    pub fn initial_value(&self) -> Value {
        if self.default.is_null() {
            self.kind.zero()
        } else {
            self.default.clone()
        }
    }
}

/// A named script. `source` is opaque to the engine and handed to the
/// script collaborator verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDecl {
    pub name: String,
    pub source: String,
}

/// How often a timer fires or a condition is polled.
///
/// Either a literal millisecond count or an expression evaluated against the
/// instance when the occurrence is scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Interval {
    Millis(u64),
    Expression(String),
}

impl Interval {
    fn is_missing(&self) -> bool {
        match self {
            Interval::Millis(ms) => *ms == 0,
            Interval::Expression(expr) => expr.trim().is_empty(),
        }
    }

    fn is_too_long(&self) -> bool {
        matches!(self, Interval::Millis(ms) if *ms > MAX_INTERVAL_MS)
    }
}

impl From<u64> for Interval {
    fn from(ms: u64) -> Self {
        Interval::Millis(ms)
    }
}

fn default_enabled() -> bool {
    true
}

/// A periodic, unconditional trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTimer {
    pub name: String,
    pub interval: Interval,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Script source run on every firing
    pub script: String,
}

impl AgentTimer {
    pub fn new(
        name: impl Into<String>,
        interval: impl Into<Interval>,
        script: impl Into<String>,
    ) -> Self {
        Self { name: name.into(), interval: interval.into(), enabled: true, script: script.into() }
    }

    crate::setters! {
        set { enabled: bool }
    }
}

/// A polled boolean check that runs its script on every true evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCondition {
    pub name: String,
    /// Boolean expression evaluated at each poll
    pub condition: String,
    pub interval: Interval,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Script source run when the condition evaluates true
    pub script: String,
}

impl AgentCondition {
    pub fn new(
        name: impl Into<String>,
        condition: impl Into<String>,
        interval: impl Into<Interval>,
        script: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            condition: condition.into(),
            interval: interval.into(),
            enabled: true,
            script: script.into(),
        }
    }

    crate::setters! {
        set { enabled: bool }
    }
}

/// A named input bound to the outputs of another agent.
///
/// The upstream instance is identified by its definition plus the parameter
/// values below (layered over the upstream definition's defaults); every
/// referencing instance with the same identity shares one upstream instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceReference {
    pub name: String,
    /// Name of the upstream definition, owned by the same user
    pub definition: String,
    #[serde(default)]
    pub parameters: SymbolTable,
}

impl DataSourceReference {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self { name: name.into(), definition: definition.into(), parameters: SymbolTable::new() }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// Immutable template for agent instances, owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub user: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<FieldDecl>,
    #[serde(default)]
    pub memory: Vec<FieldDecl>,
    #[serde(default)]
    pub outputs: Vec<FieldDecl>,
    #[serde(default)]
    pub scripts: Vec<ScriptDecl>,
    #[serde(default)]
    pub timers: Vec<AgentTimer>,
    #[serde(default)]
    pub conditions: Vec<AgentCondition>,
    #[serde(default)]
    pub inputs: Vec<DataSourceReference>,
    /// Minimum milliseconds between input-change triggered runs
    #[serde(default)]
    pub trigger_interval_ms: u64,
    #[serde(default)]
    pub reporting_interval_ms: u64,
    /// Whether new instances start enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl AgentDefinition {
    pub fn new(user: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user: user.into(),
            description: String::new(),
            parameters: Vec::new(),
            memory: Vec::new(),
            outputs: Vec::new(),
            scripts: Vec::new(),
            timers: Vec::new(),
            conditions: Vec::new(),
            inputs: Vec::new(),
            trigger_interval_ms: 0,
            reporting_interval_ms: 0,
            enabled: true,
        }
    }

    crate::setters! {
        into { description: String }
        set {
            trigger_interval_ms: u64,
            reporting_interval_ms: u64,
            enabled: bool,
        }
    }

    pub fn parameter(mut self, field: FieldDecl) -> Self {
        self.parameters.push(field);
        self
    }

    pub fn memory_field(mut self, field: FieldDecl) -> Self {
        self.memory.push(field);
        self
    }

    pub fn output(mut self, field: FieldDecl) -> Self {
        self.outputs.push(field);
        self
    }

    pub fn script(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.scripts.push(ScriptDecl { name: name.into(), source: source.into() });
        self
    }

    pub fn timer(mut self, timer: AgentTimer) -> Self {
        self.timers.push(timer);
        self
    }

    pub fn condition(mut self, condition: AgentCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn input(mut self, input: DataSourceReference) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn find_script(&self, name: &str) -> Option<&ScriptDecl> {
        self.scripts.iter().find(|s| s.name == name)
    }

    pub fn find_timer(&self, name: &str) -> Option<&AgentTimer> {
        self.timers.iter().find(|t| t.name == name)
    }

    pub fn find_condition(&self, name: &str) -> Option<&AgentCondition> {
        self.conditions.iter().find(|c| c.name == name)
    }

    pub fn find_input(&self, name: &str) -> Option<&DataSourceReference> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Parameter values for a new instance: declared defaults overlaid with
    /// `overrides`. Unknown names and ill-typed values are rejected.
    pub fn resolve_parameters(
        &self,
        overrides: &SymbolTable,
    ) -> Result<SymbolTable, DefinitionError> {
        for name in overrides.keys() {
            if !self.parameters.iter().any(|p| &p.name == name) {
                return Err(DefinitionError::UnknownParameter {
                    definition: self.name.clone(),
                    parameter: name.clone(),
                });
            }
        }
        self.parameters
            .iter()
            .map(|decl| {
                let value =
                    overrides.get(&decl.name).cloned().unwrap_or_else(|| decl.initial_value());
                check_type(decl, &value)?;
                Ok((decl.name.clone(), value))
            })
            .collect()
    }

    pub fn initial_memory(&self) -> SymbolTable {
        initial_table(&self.memory)
    }

    pub fn initial_outputs(&self) -> SymbolTable {
        initial_table(&self.outputs)
    }

    /// Validate the definition.
    ///
    /// `lookup` resolves definition names of the same user that are already
    /// registered; data-source inputs may only reference those.
    pub fn validate<'a>(
        &self,
        lookup: impl Fn(&str) -> Option<&'a AgentDefinition>,
    ) -> Result<(), DefinitionError> {
        if self.name.trim().is_empty() {
            return Err(DefinitionError::EmptyName { what: "definition" });
        }

        for (what, fields) in
            [("parameter", &self.parameters), ("memory", &self.memory), ("output", &self.outputs)]
        {
            unique_names(what, fields.iter().map(|f| f.name.as_str()))?;
            for field in fields {
                check_type(field, &field.default)?;
            }
        }
        unique_names("script", self.scripts.iter().map(|s| s.name.as_str()))?;
        unique_names("timer", self.timers.iter().map(|t| t.name.as_str()))?;
        unique_names("condition", self.conditions.iter().map(|c| c.name.as_str()))?;
        unique_names("input", self.inputs.iter().map(|i| i.name.as_str()))?;

        for timer in &self.timers {
            if timer.interval.is_missing() {
                return Err(DefinitionError::MissingInterval {
                    what: "timer",
                    name: timer.name.clone(),
                });
            }
            if timer.interval.is_too_long() {
                return Err(DefinitionError::IntervalTooLong {
                    what: "timer",
                    name: timer.name.clone(),
                });
            }
            if timer.script.trim().is_empty() {
                return Err(DefinitionError::MissingScript {
                    what: "timer",
                    name: timer.name.clone(),
                });
            }
        }

        for condition in &self.conditions {
            if condition.condition.trim().is_empty() {
                return Err(DefinitionError::MissingCondition { name: condition.name.clone() });
            }
            if condition.interval.is_missing() {
                return Err(DefinitionError::MissingInterval {
                    what: "condition",
                    name: condition.name.clone(),
                });
            }
            if condition.interval.is_too_long() {
                return Err(DefinitionError::IntervalTooLong {
                    what: "condition",
                    name: condition.name.clone(),
                });
            }
            if condition.script.trim().is_empty() {
                return Err(DefinitionError::MissingScript {
                    what: "condition",
                    name: condition.name.clone(),
                });
            }
        }

        for input in &self.inputs {
            if input.definition == self.name {
                return Err(DefinitionError::SelfReference { input: input.name.clone() });
            }
            let upstream =
                lookup(&input.definition).ok_or_else(|| DefinitionError::UnknownDefinition {
                    input: input.name.clone(),
                    definition: input.definition.clone(),
                })?;
            upstream.resolve_parameters(&input.parameters)?;
        }

        Ok(())
    }
}

fn initial_table(fields: &[FieldDecl]) -> SymbolTable {
    fields.iter().map(|f| (f.name.clone(), f.initial_value())).collect()
}

fn check_type(decl: &FieldDecl, value: &Value) -> Result<(), DefinitionError> {
    if decl.kind.accepts(value) {
        Ok(())
    } else {
        Err(DefinitionError::TypeMismatch {
            field: decl.name.clone(),
            expected: decl.kind,
            value: value.clone(),
        })
    }
}

fn unique_names<'a>(
    what: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), DefinitionError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(DefinitionError::EmptyName { what });
        }
        if !seen.insert(name) {
            return Err(DefinitionError::DuplicateName { what, name: name.to_string() });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "definition_tests.rs"]
mod tests;
