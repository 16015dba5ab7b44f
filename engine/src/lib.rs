//!
//! Scaffolding connectivity planning: given a schematic with a directed
//! support relation, compute a minimal-enough set of temporary scaffolding
//! positions so that the whole structure is buildable incrementally from a
//! single root.
//!
pub mod model;
pub mod processes;
pub mod testutils;

pub use model::collapsed::{CollapsedGraph, Component, ComponentId};
pub use model::overlay::{Classification, ScaffoldingOverlay};
pub use processes::scaffolder::{Output, Scaffolder};
pub use processes::strategy::{BreadthFirstStrategy, ScaffoldingStrategy, StrategyFn};
