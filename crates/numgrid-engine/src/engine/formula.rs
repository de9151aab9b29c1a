//! The formula entity.
//!
//! A [`Formula`] binds source text to an output region (its domain) and a set
//! of input addresses. Adjacency to other formulas is kept as address keys
//! into the [`DependencyGraph`](super::DependencyGraph) arena, never as owning
//! references.

use std::collections::BTreeSet;

use super::address::{Address, Range};
use super::cycle::GraphError;

#[derive(Clone, Debug, PartialEq)]
pub struct Formula {
    source: String,
    domain: Range,
    inputs: BTreeSet<Address>,
    /// Formulas that must be evaluated before this one.
    pub(crate) precedence: BTreeSet<Address>,
    /// Formulas that read this formula's output.
    pub(crate) subsequent: BTreeSet<Address>,
    pub(crate) dirty: bool,
}

impl Formula {
    /// Create an unlinked formula. Fails if the output domain overlaps the inputs.
    pub fn new(
        source: impl Into<String>,
        domain: Range,
        inputs: BTreeSet<Address>,
    ) -> Result<Formula, GraphError> {
        if inputs.iter().any(|a| domain.contains(a)) {
            return Err(GraphError::CircularReference {
                address: domain.top_left,
            });
        }
        Ok(Formula {
            source: source.into(),
            domain,
            inputs,
            precedence: BTreeSet::new(),
            subsequent: BTreeSet::new(),
            dirty: true,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Output top-left address; the key under which the graph stores the formula.
    pub fn address(&self) -> Address {
        self.domain.top_left
    }

    pub fn domain(&self) -> Range {
        self.domain
    }

    pub fn inputs(&self) -> &BTreeSet<Address> {
        &self.inputs
    }

    pub fn precedence(&self) -> &BTreeSet<Address> {
        &self.precedence
    }

    pub fn subsequent(&self) -> &BTreeSet<Address> {
        &self.subsequent
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn writes(&self, address: &Address) -> bool {
        self.domain.contains(address)
    }

    pub fn reads(&self, address: &Address) -> bool {
        self.inputs.contains(address)
    }

    /// The same formula with its domain translated and adjacency cleared.
    /// Inputs are unchanged: moving an output region never rewrites references.
    pub fn translated(&self, d_row: isize, d_col: isize) -> Option<Result<Formula, GraphError>> {
        let domain = self.domain.translate(d_row, d_col)?;
        Some(Formula::new(self.source.clone(), domain, self.inputs.clone()))
    }

    /// Same source, inputs and domain; adjacency cleared.
    pub fn unlinked(&self) -> Formula {
        Formula {
            source: self.source.clone(),
            domain: self.domain,
            inputs: self.inputs.clone(),
            precedence: BTreeSet::new(),
            subsequent: BTreeSet::new(),
            dirty: self.dirty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(names: &[&str]) -> BTreeSet<Address> {
        names.iter().map(|n| Address::parse(n).unwrap()).collect()
    }

    #[test]
    fn test_rejects_domain_overlapping_inputs() {
        let err = Formula::new("A1+1", Range::parse("A1:A1").unwrap(), inputs(&["A1"]));
        assert_eq!(
            err,
            Err(GraphError::CircularReference {
                address: Address::new(0, 0)
            })
        );
    }

    #[test]
    fn test_translated_keeps_inputs() {
        let f = Formula::new("A1*2", Range::parse("B1:B3").unwrap(), inputs(&["A1"])).unwrap();
        let moved = f.translated(0, 1).unwrap().unwrap();
        assert_eq!(moved.address(), Address::parse("C1").unwrap());
        assert_eq!(moved.inputs(), f.inputs());
        assert!(f.translated(0, -2).is_none());
    }

    #[test]
    fn test_translating_onto_inputs_is_circular() {
        let f = Formula::new(
            "[A1:A3]*2",
            Range::parse("B1:B3").unwrap(),
            inputs(&["A1", "A2", "A3"]),
        )
        .unwrap();
        assert!(matches!(
            f.translated(0, -1),
            Some(Err(GraphError::CircularReference { .. }))
        ));
    }
}
