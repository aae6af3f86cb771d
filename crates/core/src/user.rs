// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Users own agent definitions and instances.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user id; definitions and instances are scoped by it
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    pub created_at_ms: u64,
}

impl User {
    pub fn new(id: impl Into<String>, created_at_ms: u64) -> Self {
        let id = id.into();
        Self { display_name: id.clone(), id, created_at_ms }
    }
}
