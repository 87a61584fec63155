// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Dependency-graph ordering for workflow steps.

use crate::workflow::StepDefinition;
use std::collections::{BTreeSet, HashMap};

/// Computes a valid execution order for `steps` respecting `depends_on`
/// edges via Kahn's algorithm. The ready set is a `BTreeSet` of declaration
/// indices rather than an arbitrary queue, so steps with no outstanding
/// dependency are always scheduled in their original declaration order;
/// two independent steps never get reordered relative to each other.
/// Returns the name of a step involved in a cycle as an error.
pub fn topological_order(steps: &[StepDefinition]) -> Result<Vec<String>, String> {
    let index_of: HashMap<&str, usize> =
        steps.iter().enumerate().map(|(i, s)| (s.name.as_str(), i)).collect();

    let mut in_degree = vec![0usize; steps.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); steps.len()];

    for (i, step) in steps.iter().enumerate() {
        for dep in &step.depends_on {
            if let Some(&from) = index_of.get(dep.as_str()) {
                dependents[from].push(i);
                in_degree[i] += 1;
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..steps.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(steps.len());

    while let Some(&i) = ready.iter().next() {
        ready.remove(&i);
        order.push(steps[i].name.clone());
        for &dependent in &dependents[i] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() != steps.len() {
        let stuck = (0..steps.len())
            .find(|&i| in_degree[i] > 0)
            .map(|i| steps[i].name.clone())
            .unwrap_or_default();
        return Err(stuck);
    }

    Ok(order)
}
