//! Dependency graph index.
//!
//! The graph owns every live [`Formula`], keyed by the top-left address of its
//! output domain. Two secondary indexes make the common queries cheap:
//!
//! - `coverage`: cell -> key of the formula whose domain contains it
//! - `readers`: cell -> keys of the formulas that read it
//!
//! Precedence/subsequent adjacency lives on the formulas as key sets, so
//! removing a formula is a single unlink pass over its peers.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::address::{Address, Range};
use super::cycle::{GraphError, Links, check_candidate, detect_cycle};
use super::formula::Formula;

#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    formulas: BTreeMap<Address, Formula>,
    coverage: HashMap<Address, Address>,
    readers: HashMap<Address, BTreeSet<Address>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Formula> {
        self.formulas.values()
    }

    pub fn addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.formulas.keys().copied()
    }

    /// Formula keyed at `address` (its output top-left).
    pub fn formula_at(&self, address: &Address) -> Option<&Formula> {
        self.formulas.get(address)
    }

    /// Formula whose output domain contains `address`.
    pub fn covering(&self, address: &Address) -> Option<&Formula> {
        self.coverage
            .get(address)
            .and_then(|key| self.formulas.get(key))
    }

    /// Keys of the formulas whose inputs contain `address`.
    pub fn formulas_depending_on(&self, address: &Address) -> BTreeSet<Address> {
        self.readers.get(address).cloned().unwrap_or_default()
    }

    /// Keys of the formulas whose domain intersects `range`.
    pub fn overlapping(&self, range: &Range) -> BTreeSet<Address> {
        self.formulas
            .values()
            .filter(|f| f.domain().intersects(range))
            .map(Formula::address)
            .collect()
    }

    /// Compute the adjacency `candidate` would have, skipping `excluded` keys.
    pub fn links_for(&self, candidate: &Formula, excluded: &BTreeSet<Address>) -> Links {
        let precedence = candidate
            .inputs()
            .iter()
            .filter_map(|a| self.coverage.get(a))
            .filter(|key| !excluded.contains(key))
            .copied()
            .collect();
        let subsequent = candidate
            .domain()
            .cells()
            .filter_map(|a| self.readers.get(&a))
            .flatten()
            .filter(|key| !excluded.contains(key))
            .copied()
            .collect();
        Links {
            precedence,
            subsequent,
        }
    }

    /// Insert a formula, replacing every formula whose domain overlaps it.
    ///
    /// The candidate is validated by the cycle detector first; on rejection the
    /// graph is untouched. On success the displaced formulas are returned.
    pub fn insert(&mut self, mut formula: Formula) -> Result<Vec<Formula>, GraphError> {
        let displaced_keys = self.overlapping(&formula.domain());
        let links = check_candidate(self, &formula, &displaced_keys)?;

        let displaced: Vec<Formula> = displaced_keys
            .iter()
            .filter_map(|key| self.remove(key))
            .collect();

        let key = formula.address();
        for p in &links.precedence {
            if let Some(peer) = self.formulas.get_mut(p) {
                peer.subsequent.insert(key);
            }
        }
        for s in &links.subsequent {
            if let Some(peer) = self.formulas.get_mut(s) {
                peer.precedence.insert(key);
            }
        }
        formula.precedence = links.precedence;
        formula.subsequent = links.subsequent;
        self.index(&formula);

        log::debug!(
            "linked formula at {} (domain {}, {} precedence, {} subsequent)",
            key,
            formula.domain(),
            formula.precedence.len(),
            formula.subsequent.len()
        );
        self.formulas.insert(key, formula);
        Ok(displaced)
    }

    /// Remove the formula keyed at `address`, unlinking it from every peer.
    pub fn remove(&mut self, address: &Address) -> Option<Formula> {
        let formula = self.formulas.remove(address)?;
        for p in &formula.precedence {
            if let Some(peer) = self.formulas.get_mut(p) {
                peer.subsequent.remove(address);
            }
        }
        for s in &formula.subsequent {
            if let Some(peer) = self.formulas.get_mut(s) {
                peer.precedence.remove(address);
            }
        }
        self.unindex(&formula);
        log::debug!("removed formula at {}", address);
        Some(formula)
    }

    pub fn clear(&mut self) {
        self.formulas.clear();
        self.coverage.clear();
        self.readers.clear();
    }

    pub(crate) fn set_dirty(&mut self, address: &Address, dirty: bool) {
        if let Some(formula) = self.formulas.get_mut(address) {
            formula.dirty = dirty;
        }
    }

    /// True when no precedence path loops back on itself.
    pub fn is_acyclic(&self) -> bool {
        self.formulas
            .keys()
            .all(|key| detect_cycle(key, self).is_none())
    }

    fn index(&mut self, formula: &Formula) {
        let key = formula.address();
        for cell in formula.domain().cells() {
            self.coverage.insert(cell, key);
        }
        for input in formula.inputs() {
            self.readers.entry(*input).or_default().insert(key);
        }
    }

    fn unindex(&mut self, formula: &Formula) {
        let key = formula.address();
        for cell in formula.domain().cells() {
            if self.coverage.get(&cell) == Some(&key) {
                self.coverage.remove(&cell);
            }
        }
        for input in formula.inputs() {
            if let Some(keys) = self.readers.get_mut(input) {
                keys.remove(&key);
                if keys.is_empty() {
                    self.readers.remove(input);
                }
            }
        }
    }

    /// Serialize every formula with adjacency as `(row, column)` pairs.
    pub fn to_persisted(&self) -> Vec<PersistedFormula> {
        self.formulas.values().map(PersistedFormula::from).collect()
    }

    /// Rebuild a graph from persisted formulas. Links are re-derived from
    /// inputs and domains through the cycle detector; persisted pairs that
    /// disagree with them are logged and ignored. Formulas whose domain
    /// overlaps an earlier one are skipped. A cyclic sheet is rejected.
    pub fn from_persisted(entries: &[PersistedFormula]) -> Result<DependencyGraph, GraphError> {
        let mut graph = DependencyGraph::new();
        for entry in entries {
            let formula = Formula::new(
                entry.source.clone(),
                entry.domain,
                entry.inputs.iter().copied().map(Address::from_pair).collect(),
            )?;
            if !graph.overlapping(&formula.domain()).is_empty() {
                log::warn!(
                    "skipping persisted formula at {}: overlapping domain",
                    formula.address()
                );
                continue;
            }
            graph.insert(formula)?;
        }

        let keys: BTreeSet<Address> = graph.formulas.keys().copied().collect();
        for entry in entries {
            let key = entry.domain.top_left;
            let Some(formula) = graph.formulas.get_mut(&key) else {
                continue;
            };
            if resolve_pairs(&entry.precedence, &keys) != formula.precedence
                || resolve_pairs(&entry.subsequent, &keys) != formula.subsequent
            {
                log::warn!("persisted links for {} disagree with its inputs", key);
            }
            formula.dirty = false;
        }
        Ok(graph)
    }
}

fn resolve_pairs(pairs: &[(usize, usize)], keys: &BTreeSet<Address>) -> BTreeSet<Address> {
    pairs
        .iter()
        .copied()
        .map(Address::from_pair)
        .filter(|a| keys.contains(a))
        .collect()
}

/// A formula as written across the persistence boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedFormula {
    pub source: String,
    pub domain: Range,
    pub inputs: Vec<(usize, usize)>,
    pub precedence: Vec<(usize, usize)>,
    pub subsequent: Vec<(usize, usize)>,
}

impl From<&Formula> for PersistedFormula {
    fn from(formula: &Formula) -> Self {
        PersistedFormula {
            source: formula.source().to_string(),
            domain: formula.domain(),
            inputs: formula.inputs().iter().map(|a| a.to_pair()).collect(),
            precedence: formula.precedence().iter().map(|a| a.to_pair()).collect(),
            subsequent: formula.subsequent().iter().map(|a| a.to_pair()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formula(source: &str, domain: &str, inputs: &[&str]) -> Formula {
        let inputs = inputs.iter().map(|n| Address::parse(n).unwrap()).collect();
        Formula::new(source, Range::parse(domain).unwrap(), inputs).unwrap()
    }

    fn addr(name: &str) -> Address {
        Address::parse(name).unwrap()
    }

    #[test]
    fn test_insert_links_both_directions() {
        let mut graph = DependencyGraph::new();
        graph.insert(formula("A1", "B2:B2", &["A1"])).unwrap();
        graph.insert(formula("B2", "C2:C2", &["B2"])).unwrap();

        let f1 = graph.formula_at(&addr("B2")).unwrap();
        let f2 = graph.formula_at(&addr("C2")).unwrap();
        assert_eq!(f1.subsequent(), &BTreeSet::from([addr("C2")]));
        assert_eq!(f2.precedence(), &BTreeSet::from([addr("B2")]));
        assert_eq!(graph.formulas_depending_on(&addr("A1")), BTreeSet::from([addr("B2")]));
    }

    #[test]
    fn test_insert_links_when_dependent_exists_first() {
        let mut graph = DependencyGraph::new();
        graph.insert(formula("[B1:B3]", "D1:D3", &["B1", "B2", "B3"])).unwrap();
        graph.insert(formula("[A1:A3]*2", "B1:B3", &["A1", "A2", "A3"])).unwrap();
        let upstream = graph.formula_at(&addr("B1")).unwrap();
        assert_eq!(upstream.subsequent(), &BTreeSet::from([addr("D1")]));
        assert_eq!(
            graph.formula_at(&addr("D1")).unwrap().precedence(),
            &BTreeSet::from([addr("B1")])
        );
    }

    #[test]
    fn test_covering_finds_matrix_owner() {
        let mut graph = DependencyGraph::new();
        graph.insert(formula("[A1:A3]*2", "B1:B3", &["A1", "A2", "A3"])).unwrap();
        assert_eq!(graph.covering(&addr("B3")).unwrap().address(), addr("B1"));
        assert!(graph.formula_at(&addr("B3")).is_none());
    }

    #[test]
    fn test_rejected_insert_leaves_graph_unchanged() {
        let mut graph = DependencyGraph::new();
        graph.insert(formula("A1", "B1:B1", &["A1"])).unwrap();
        graph.insert(formula("B1", "C1:C1", &["B1"])).unwrap();
        let before = graph.to_persisted();

        assert!(graph.insert(formula("C1", "A1:A1", &["C1"])).is_err());
        assert_eq!(graph.to_persisted(), before);
        assert!(graph.formula_at(&addr("A1")).is_none());
        assert!(graph.formulas_depending_on(&addr("C1")).is_empty());
    }

    #[test]
    fn test_insert_replaces_overlapping_formula() {
        let mut graph = DependencyGraph::new();
        graph.insert(formula("A1", "B1:B1", &["A1"])).unwrap();
        graph.insert(formula("B1", "C1:C1", &["B1"])).unwrap();

        let displaced = graph.insert(formula("A2", "B1:B1", &["A2"])).unwrap();
        assert_eq!(displaced.len(), 1);
        assert_eq!(displaced[0].source(), "A1");
        assert!(graph.formulas_depending_on(&addr("A1")).is_empty());
        assert_eq!(
            graph.formula_at(&addr("C1")).unwrap().precedence(),
            &BTreeSet::from([addr("B1")])
        );
    }

    #[test]
    fn test_remove_unlinks_peers() {
        let mut graph = DependencyGraph::new();
        graph.insert(formula("A1", "B1:B1", &["A1"])).unwrap();
        graph.insert(formula("B1", "C1:C1", &["B1"])).unwrap();
        graph.remove(&addr("B1")).unwrap();

        assert!(graph.formula_at(&addr("C1")).unwrap().precedence().is_empty());
        assert!(graph.covering(&addr("B1")).is_none());
        assert!(graph.formulas_depending_on(&addr("A1")).is_empty());
    }

    #[test]
    fn test_persisted_round_trip_rebuilds_links() {
        let mut graph = DependencyGraph::new();
        graph.insert(formula("A1", "B1:B1", &["A1"])).unwrap();
        graph.insert(formula("B1", "C1:C1", &["B1"])).unwrap();

        let persisted = graph.to_persisted();
        assert_eq!(persisted[0].subsequent, vec![(0, 2)]);

        let rebuilt = DependencyGraph::from_persisted(&persisted).unwrap();
        assert_eq!(rebuilt.to_persisted(), persisted);
        assert_eq!(
            rebuilt.covering(&addr("C1")).unwrap().precedence(),
            &BTreeSet::from([addr("B1")])
        );
        assert!(rebuilt.is_acyclic());
    }

    #[test]
    fn test_from_persisted_rejects_cycles() {
        let entries = vec![
            PersistedFormula {
                source: "A1".into(),
                domain: Range::parse("B1:B1").unwrap(),
                inputs: vec![(0, 0)],
                precedence: vec![(0, 0)],
                subsequent: vec![(0, 0)],
            },
            PersistedFormula {
                source: "B1".into(),
                domain: Range::parse("A1:A1").unwrap(),
                inputs: vec![(0, 1)],
                precedence: vec![(0, 1)],
                subsequent: vec![(0, 1)],
            },
        ];
        let err = DependencyGraph::from_persisted(&entries).unwrap_err();
        assert!(matches!(err, GraphError::CircularReference { .. }));
    }

    #[test]
    fn test_from_persisted_derives_missing_links() {
        let entries = vec![
            PersistedFormula {
                source: "B1".into(),
                domain: Range::parse("C1:C1").unwrap(),
                inputs: vec![(0, 1)],
                precedence: vec![],
                subsequent: vec![],
            },
            PersistedFormula {
                source: "A1".into(),
                domain: Range::parse("B1:B1").unwrap(),
                inputs: vec![(0, 0)],
                precedence: vec![],
                subsequent: vec![],
            },
        ];
        let graph = DependencyGraph::from_persisted(&entries).unwrap();
        assert_eq!(
            graph.formula_at(&addr("C1")).unwrap().precedence(),
            &BTreeSet::from([addr("B1")])
        );
        assert!(!graph.formula_at(&addr("C1")).unwrap().is_dirty());
    }

    #[test]
    fn test_from_persisted_drops_dangling_pairs() {
        let entries = vec![PersistedFormula {
            source: "A1".into(),
            domain: Range::parse("B1:B1").unwrap(),
            inputs: vec![(0, 0)],
            precedence: vec![(9, 9)],
            subsequent: vec![],
        }];
        let graph = DependencyGraph::from_persisted(&entries).unwrap();
        assert!(graph.formula_at(&addr("B1")).unwrap().precedence().is_empty());
    }
}
