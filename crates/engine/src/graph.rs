// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reference-counted edges between upstream instances and their dependents.
//!
//! A dependent holding two inputs satisfied by the same upstream counts as
//! two references. An upstream may be released only once its count is zero.

use ag_core::InstanceId;
use indexmap::IndexMap;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// upstream → dependent → references
    dependents: HashMap<InstanceId, IndexMap<InstanceId, u32>>,
}

impl DependencyGraph {
    pub fn add_edge(&mut self, upstream: &InstanceId, dependent: &InstanceId) {
        let edges = self.dependents.entry(upstream.clone()).or_default();
        *edges.entry(dependent.clone()).or_insert(0) += 1;
    }

    /// Drop one reference. Returns true when the upstream is left with no dependents.
    pub fn remove_edge(&mut self, upstream: &InstanceId, dependent: &InstanceId) -> bool {
        let Some(edges) = self.dependents.get_mut(upstream) else {
            return true;
        };
        if let Some(count) = edges.get_mut(dependent) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                edges.shift_remove(dependent);
            }
        }
        if edges.is_empty() {
            self.dependents.remove(upstream);
            true
        } else {
            false
        }
    }

    /// Distinct dependents of `upstream`, in the order they were first bound.
    pub fn dependents(&self, upstream: &InstanceId) -> Vec<InstanceId> {
        self.dependents
            .get(upstream)
            .map(|edges| edges.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn dependent_count(&self, upstream: &InstanceId) -> usize {
        self.dependents.get(upstream).map_or(0, IndexMap::len)
    }

    /// Total references held on `upstream`.
    pub fn reference_count(&self, upstream: &InstanceId) -> u32 {
        self.dependents.get(upstream).map_or(0, |edges| edges.values().sum())
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
