// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::value::{SymbolTable, Value};

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for symbol values.
pub mod strategies {
    use crate::value::{SymbolTable, Value};
    use proptest::prelude::*;

    /// Scalar JSON values. Floats are kept finite so values survive a JSON
    /// round trip unchanged.
    pub fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            (-1.0e9f64..1.0e9f64).prop_map(Value::from),
            "[a-z0-9 ]{0,12}".prop_map(Value::String),
        ]
    }

    pub fn arb_value() -> impl Strategy<Value = Value> {
        arb_scalar().prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    pub fn arb_table() -> impl Strategy<Value = SymbolTable> {
        prop::collection::btree_map("[a-z]{1,8}", arb_value(), 0..6)
            .prop_map(|m| m.into_iter().collect())
    }
}

// ── Table builders ─────────────────────────────────────────────────────

/// Build a symbol table from `(name, value)` pairs.
pub fn table<V: Into<Value> + Clone>(pairs: &[(&str, V)]) -> SymbolTable {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone().into())).collect()
}
