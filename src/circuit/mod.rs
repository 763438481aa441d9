//! Circuit graph representation and validation.
//!
//! This module provides the representation of a circuit after parsing.
//! The [`Circuit`] struct holds all components, nodes and netlist-level
//! settings; [`node_currents`] groups pin currents per node for the
//! Kirchhoff current law.

mod graph;
mod types;
mod validate;

pub use graph::{node_currents, Circuit, AUTO_REFERENCE};
pub use types::*;
pub use validate::{validate_circuit, validate_components};
