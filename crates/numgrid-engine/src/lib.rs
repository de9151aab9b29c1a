//! numgrid_engine - Dependency graph, recalculation and the Rhai evaluator.

pub(crate) mod builtins;
pub mod engine;
