// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Symbol values and symbol tables.
//!
//! Agent fields hold JSON values. A symbol table maps field names to their
//! current value and keeps declaration order, so snapshots serialize
//! deterministically.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use serde_json::Value;

/// Field name → current value, in declaration order.
pub type SymbolTable = IndexMap<String, Value>;

/// Declared type of a parameter, memory, or output field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Any,
    Bool,
    Int,
    Float,
    String,
    List,
    Map,
}

crate::simple_display! {
    FieldType {
        Any => "any",
        Bool => "bool",
        Int => "int",
        Float => "float",
        String => "string",
        List => "list",
        Map => "map",
    }
}

impl FieldType {
    /// Whether `value` may be stored in a field of this type.
    ///
    /// `null` is accepted everywhere; ints are accepted by float fields.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (FieldType::Any, _) => true,
            (FieldType::Bool, Value::Bool(_)) => true,
            (FieldType::Int, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (FieldType::Float, Value::Number(_)) => true,
            (FieldType::String, Value::String(_)) => true,
            (FieldType::List, Value::Array(_)) => true,
            (FieldType::Map, Value::Object(_)) => true,
            _ => false,
        }
    }

    /// Value a field of this type starts with when no default is declared.
    pub fn zero(&self) -> Value {
        match self {
            FieldType::Any => Value::Null,
            FieldType::Bool => Value::Bool(false),
            FieldType::Int => Value::from(0),
            FieldType::Float => Value::from(0.0),
            FieldType::String => Value::String(String::new()),
            FieldType::List => Value::Array(Vec::new()),
            FieldType::Map => Value::Object(serde_json::Map::new()),
        }
    }
}

/// Symbol table categories visible to scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Parameters,
    Memory,
    Outputs,
    Inputs,
}

crate::simple_display! {
    Category {
        Parameters => "parameters",
        Memory => "memory",
        Outputs => "outputs",
        Inputs => "inputs",
    }
}

/// Boolean interpretation of a script result.
///
/// `null`, `false`, zero, and empty strings/lists/maps are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Longest interval a timer or condition may be armed with: one year.
pub const MAX_INTERVAL_MS: u64 = 365 * 24 * 60 * 60 * 1000;

/// Interpret a script result as a millisecond interval in
/// `1..=MAX_INTERVAL_MS`.
pub fn as_interval_ms(value: &Value) -> Option<u64> {
    let ms = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64().filter(|f| (1.0..=MAX_INTERVAL_MS as f64).contains(f)).map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    (1..=MAX_INTERVAL_MS).contains(&ms).then_some(ms)
}

/// Snapshot a symbol table as a single JSON object value.
pub fn table_to_value(table: &SymbolTable) -> Value {
    Value::Object(table.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
