//! # symcirc
//!
//! A symbolic and numeric transient solver for small linear circuits.
//!
//! This library provides:
//! - A SPICE-like netlist language for describing circuits
//! - A small expression engine over one time variable
//! - An equation compiler that turns a circuit into one differential
//!   equation per unknown, with initial values
//! - A solver that races a closed-form attempt against an adaptive numeric
//!   integrator for every unknown
//!
//! ## Architecture
//!
//! - [`dsl`] - Parser for the netlist language
//! - [`circuit`] - Nodes, pins and circuit assembly
//! - [`components`] - Component models and their equations
//! - [`expr`] - Expressions, equations and equation systems
//! - [`compiler`] - Simplification, decoupling and initial values
//! - [`solver`] - Closed-form and numeric solving, worker pool, driver
//! - [`function`] - Solved unknowns as functions of time
//! - [`output`] - CSV output
//!
//! ## Usage
//!
//! ```bash
//! symcirc rc.cir --duration 5m --samples 200 > rc.csv
//! symcirc rc.cir --sweep R=1k,2k,5k > rc-sweep.csv
//! ```
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use symcirc::{dsl, solve, Circuit};
//!
//! let ast = dsl::parse("V1 in 0 5\nR1 in out 1k\nC1 out 0 1u\n.tran 5m\n")?;
//! let circuit = Circuit::from_ast(ast)?;
//! for function in solve(&circuit.components, 5e-3, &circuit.parameters)? {
//!     println!("{} at 1ms: {}", function.id(), function.eval(1e-3)?);
//! }
//! # Ok::<(), symcirc::SymcircError>(())
//! ```
//!
//! ## Method
//!
//! Each component contributes algebraic (invariant) equations and equations
//! in integral form. The algebraic ones are solved for as many unknowns as
//! possible and substituted into the rest. What remains is decoupled into
//! one integral equation per unknown, differentiated into an ODE, and
//! evaluated at `t = 0` to find the initial values.

pub mod circuit;
pub mod compiler;
pub mod components;
pub mod dsl;
pub mod error;
pub mod expr;
pub mod function;
pub mod output;
pub mod solver;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use compiler::Compiler;
pub use error::{Result, SymcircError};
pub use function::Function;
pub use solver::{solve, solve_with_config, sweep, Solution, SolverConfig, Sweep};

/// Default simulation duration in seconds, when neither the netlist nor the
/// caller gives one.
pub const DEFAULT_DURATION: f64 = 1.0;
