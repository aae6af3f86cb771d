// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The script-evaluator seam.
//!
//! The engine never interprets script text itself. A [`ScriptRunner`]
//! evaluates source against a [`ScriptContext`] holding copies of the
//! instance's symbol tables; the engine writes memory and outputs back once
//! the run completes.

use ag_core::{Category, InstanceId, SymbolTable, Value};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// The script raised an error of its own
    #[error("{0}")]
    Raised(String),
    #[error("unknown symbol {category}.{name}")]
    UnknownSymbol { category: Category, name: String },
    #[error("{0} are read-only")]
    ReadOnly(Category),
    /// The evaluator could not run the source at all
    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// Symbol tables and identity a script runs against.
#[derive(Debug, Clone)]
pub struct ScriptContext {
    instance: InstanceId,
    user: String,
    name: String,
    definition: String,
    parameters: SymbolTable,
    memory: SymbolTable,
    outputs: SymbolTable,
    inputs: SymbolTable,
}

impl ScriptContext {
    pub fn new(
        instance: InstanceId,
        user: impl Into<String>,
        name: impl Into<String>,
        definition: impl Into<String>,
    ) -> Self {
        Self {
            instance,
            user: user.into(),
            name: name.into(),
            definition: definition.into(),
            parameters: SymbolTable::new(),
            memory: SymbolTable::new(),
            outputs: SymbolTable::new(),
            inputs: SymbolTable::new(),
        }
    }

    pub fn with_tables(
        mut self,
        parameters: SymbolTable,
        memory: SymbolTable,
        outputs: SymbolTable,
        inputs: SymbolTable,
    ) -> Self {
        self.parameters = parameters;
        self.memory = memory;
        self.outputs = outputs;
        self.inputs = inputs;
        self
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn instance_name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn table(&self, category: Category) -> &SymbolTable {
        match category {
            Category::Parameters => &self.parameters,
            Category::Memory => &self.memory,
            Category::Outputs => &self.outputs,
            Category::Inputs => &self.inputs,
        }
    }

    pub fn get(&self, category: Category, name: &str) -> Option<&Value> {
        self.table(category).get(name)
    }

    /// Assign a declared memory or output field.
    ///
    /// Parameters and inputs are read-only; names must already exist in the
    /// table (every declared field is present from creation).
    pub fn set(
        &mut self,
        category: Category,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), ScriptError> {
        let table = match category {
            Category::Memory => &mut self.memory,
            Category::Outputs => &mut self.outputs,
            Category::Parameters | Category::Inputs => return Err(ScriptError::ReadOnly(category)),
        };
        match table.get_mut(name) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(ScriptError::UnknownSymbol { category, name: name.to_string() }),
        }
    }

    /// Suspend the script without holding a scheduler thread.
    pub async fn wait(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    pub(crate) fn into_tables(self) -> (SymbolTable, SymbolTable) {
        (self.memory, self.outputs)
    }
}

/// Evaluates script source for the engine.
///
/// Used for scripts, condition expressions, and interval expressions alike.
#[async_trait]
pub trait ScriptRunner: Send + Sync + 'static {
    async fn evaluate(
        &self,
        source: &str,
        ctx: &mut ScriptContext,
        args: &[Value],
    ) -> Result<Value, ScriptError>;
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;
