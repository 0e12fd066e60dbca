//! Component dependency ordering
//!
//! Computes a deterministic deployment order from declared dependency
//! edges: every dependency appears strictly before its dependents, and
//! ties among ready components break by recipe-declared order.

use std::collections::HashMap;

use crate::error::{RecipeError, Result};
use crate::model::ComponentRef;

/// Stable topological sort over component references.
///
/// Edges run `dependency -> component` for each entry in
/// `dependency_refs`. Returns the component names in deployment order, a
/// permutation of the input names.
///
/// Errors: [`RecipeError::UnresolvedDependency`] when a dependency names
/// an unknown component, [`RecipeError::Cycle`] listing the components
/// still blocked after the fixpoint.
pub fn deployment_order(components: &[ComponentRef]) -> Result<Vec<String>> {
    let index: HashMap<&str, usize> = components
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.as_str(), i))
        .collect();

    // In-degree per component, validating edges as we go.
    let mut in_degree = vec![0usize; components.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); components.len()];

    for (i, component) in components.iter().enumerate() {
        for dep in &component.dependency_refs {
            let Some(&dep_index) = index.get(dep.as_str()) else {
                return Err(RecipeError::UnresolvedDependency {
                    component: component.name.clone(),
                    dependency: dep.clone(),
                });
            };
            in_degree[i] += 1;
            dependents[dep_index].push(i);
        }
    }

    let mut order = Vec::with_capacity(components.len());
    let mut emitted = vec![false; components.len()];

    // Kahn fixpoint; each round scans in declared order so the tie-break
    // among ready components is the recipe-declared order.
    loop {
        let mut progressed = false;
        for i in 0..components.len() {
            if emitted[i] || in_degree[i] != 0 {
                continue;
            }
            emitted[i] = true;
            progressed = true;
            order.push(components[i].name.clone());
            for &dependent in &dependents[i] {
                in_degree[dependent] -= 1;
            }
        }
        if !progressed {
            break;
        }
    }

    if order.len() != components.len() {
        let participants: Vec<String> = components
            .iter()
            .enumerate()
            .filter(|(i, _)| !emitted[*i])
            .map(|(_, c)| c.name.clone())
            .collect();
        return Err(RecipeError::Cycle { participants });
    }

    Ok(order)
}
