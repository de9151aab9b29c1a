//! Circular dependency detection for formulas.
//!
//! Before a formula enters the graph (insert, move, domain change) we compute
//! the formulas it would depend on and the formulas that would depend on it.
//! A candidate closes a cycle when those sets share a member, or when one of
//! its subsequent formulas is reachable upstream from one of its precedence
//! formulas (A -> B -> C -> A, which pairwise intersection misses).

use std::collections::BTreeSet;
use thiserror::Error;

use super::address::Address;
use super::formula::Formula;
use super::graph::DependencyGraph;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Formula at {address} creates a circular reference")]
    CircularReference { address: Address },
}

/// The adjacency a candidate formula would receive if committed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Links {
    pub precedence: BTreeSet<Address>,
    pub subsequent: BTreeSet<Address>,
}

/// Validate a candidate against the current graph, ignoring the formulas in
/// `excluded` (those it is about to replace). Returns the links to commit.
pub fn check_candidate(
    graph: &DependencyGraph,
    candidate: &Formula,
    excluded: &BTreeSet<Address>,
) -> Result<Links, GraphError> {
    let address = candidate.address();
    let rejected = GraphError::CircularReference { address };

    if candidate.inputs().iter().any(|a| candidate.writes(a)) {
        return Err(rejected);
    }

    let links = graph.links_for(candidate, excluded);
    if links.precedence.intersection(&links.subsequent).next().is_some() {
        return Err(rejected);
    }

    let mut visited = BTreeSet::new();
    for start in &links.precedence {
        if let Some(path) = reaches(graph, start, &links.subsequent, excluded, &mut visited) {
            log::warn!(
                "rejecting formula at {}: upstream path {}",
                address,
                format_path(&path)
            );
            return Err(rejected);
        }
    }

    Ok(links)
}

/// Walk precedence edges from `current`; returns the path if any target is hit.
fn reaches(
    graph: &DependencyGraph,
    current: &Address,
    targets: &BTreeSet<Address>,
    excluded: &BTreeSet<Address>,
    visited: &mut BTreeSet<Address>,
) -> Option<Vec<Address>> {
    if targets.contains(current) {
        return Some(vec![*current]);
    }
    if excluded.contains(current) || !visited.insert(*current) {
        return None;
    }
    let formula = graph.formula_at(current)?;
    for next in formula.precedence() {
        if let Some(mut path) = reaches(graph, next, targets, excluded, visited) {
            path.push(*current);
            return Some(path);
        }
    }
    None
}

/// Detect a cycle in the committed graph reachable from `start` via precedence
/// edges. Returns Some(cycle_path) if a cycle is found, None otherwise.
pub fn detect_cycle(start: &Address, graph: &DependencyGraph) -> Option<Vec<Address>> {
    let mut visiting = BTreeSet::new();
    let mut done = BTreeSet::new();
    let mut path = Vec::new();

    if detect_cycle_dfs(start, graph, &mut visiting, &mut done, &mut path) {
        Some(path)
    } else {
        None
    }
}

fn detect_cycle_dfs(
    current: &Address,
    graph: &DependencyGraph,
    visiting: &mut BTreeSet<Address>,
    done: &mut BTreeSet<Address>,
    path: &mut Vec<Address>,
) -> bool {
    if visiting.contains(current) {
        path.push(*current);
        return true;
    }
    if done.contains(current) {
        return false;
    }

    let deps = match graph.formula_at(current) {
        Some(formula) => formula.precedence().clone(),
        None => return false,
    };

    visiting.insert(*current);
    path.push(*current);

    for dep in &deps {
        if detect_cycle_dfs(dep, graph, visiting, done, path) {
            return true;
        }
    }

    path.pop();
    visiting.remove(current);
    done.insert(*current);
    false
}

fn format_path(path: &[Address]) -> String {
    path.iter()
        .map(Address::to_string)
        .collect::<Vec<_>>()
        .join(" <- ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Range;

    fn formula(source: &str, domain: &str, inputs: &[&str]) -> Formula {
        let inputs = inputs.iter().map(|n| Address::parse(n).unwrap()).collect();
        Formula::new(source, Range::parse(domain).unwrap(), inputs).unwrap()
    }

    #[test]
    fn test_direct_two_node_cycle_rejected() {
        let mut graph = DependencyGraph::new();
        graph.insert(formula("A1", "B1:B1", &["A1"])).unwrap();
        let candidate = formula("B1", "A1:A1", &["B1"]);
        let err = check_candidate(&graph, &candidate, &BTreeSet::new()).unwrap_err();
        assert_eq!(err, GraphError::CircularReference { address: Address::new(0, 0) });
    }

    #[test]
    fn test_indirect_cycle_rejected() {
        // B1 <- A1, C1 <- B1, then A1 <- C1 closes A -> B -> C -> A.
        let mut graph = DependencyGraph::new();
        graph.insert(formula("A1", "B1:B1", &["A1"])).unwrap();
        graph.insert(formula("B1", "C1:C1", &["B1"])).unwrap();
        let candidate = formula("C1", "A1:A1", &["C1"]);
        assert!(check_candidate(&graph, &candidate, &BTreeSet::new()).is_err());
    }

    #[test]
    fn test_replacement_ignores_excluded() {
        let mut graph = DependencyGraph::new();
        graph.insert(formula("A1", "B1:B1", &["A1"])).unwrap();
        graph.insert(formula("B1", "C1:C1", &["B1"])).unwrap();
        // Replacing B1 with a constant breaks the chain.
        let candidate = formula("5", "B1:B1", &[]);
        let excluded = BTreeSet::from([Address::new(0, 1)]);
        let links = check_candidate(&graph, &candidate, &excluded).unwrap();
        assert!(links.precedence.is_empty());
        assert_eq!(links.subsequent, BTreeSet::from([Address::new(0, 2)]));
    }

    #[test]
    fn test_detect_cycle_on_acyclic_graph() {
        let mut graph = DependencyGraph::new();
        graph.insert(formula("A1", "B1:B1", &["A1"])).unwrap();
        graph.insert(formula("B1", "C1:C1", &["B1"])).unwrap();
        assert!(detect_cycle(&Address::new(0, 2), &graph).is_none());
    }
}
