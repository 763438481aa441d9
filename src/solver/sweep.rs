//! Parameter sweeps.
//!
//! A sweep compiles the circuit once and starts one [`Solution`] per point
//! of a grid of parameter values. Swept parameters without explicit values
//! run over the decades `1e-9 ..= 1e6`.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use tracing::{debug, info};

use crate::compiler::Compiler;
use crate::components::Component;
use crate::error::{Result, SymcircError};
use crate::expr::Symbol;

use super::{prepare, Solution, SolverConfig};

/// Exponents of the default decade grid.
pub const DECADES: RangeInclusive<i32> = -9..=6;

/// Values taken by one swept parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub symbol: Symbol,
    pub values: Vec<f64>,
}

impl Axis {
    pub fn new(symbol: impl Into<Symbol>, values: Vec<f64>) -> Self {
        Self {
            symbol: symbol.into(),
            values,
        }
    }

    /// Every power of ten in [`DECADES`].
    pub fn decades(symbol: impl Into<Symbol>) -> Self {
        Self::new(symbol, DECADES.map(|k| 10f64.powi(k)).collect())
    }
}

/// Cartesian product of axes on top of fixed values.
///
/// The last axis varies fastest. With no axes the grid has one point, the
/// fixed values themselves.
#[derive(Debug, Clone)]
pub struct ParameterGrid {
    fixed: BTreeMap<Symbol, f64>,
    axes: Vec<Axis>,
    cursor: Option<Vec<usize>>,
}

impl ParameterGrid {
    pub fn new(fixed: BTreeMap<Symbol, f64>, axes: Vec<Axis>) -> Self {
        let cursor = axes.iter().all(|a| !a.values.is_empty()).then(|| vec![0; axes.len()]);
        Self { fixed, axes, cursor }
    }

    /// Number of points in the whole grid.
    pub fn points(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    /// Symbols that get a value at every point.
    pub fn covers(&self, symbol: &Symbol) -> bool {
        self.fixed.contains_key(symbol) || self.axes.iter().any(|a| &a.symbol == symbol)
    }
}

impl Iterator for ParameterGrid {
    type Item = BTreeMap<Symbol, f64>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.as_mut()?;
        let mut point = self.fixed.clone();
        for (axis, &i) in self.axes.iter().zip(cursor.iter()) {
            point.insert(axis.symbol.clone(), axis.values[i]);
        }

        // odometer step
        let mut k = cursor.len();
        loop {
            if k == 0 {
                self.cursor = None;
                break;
            }
            k -= 1;
            cursor[k] += 1;
            if cursor[k] < self.axes[k].values.len() {
                break;
            }
            cursor[k] = 0;
        }
        Some(point)
    }
}

/// Lazily started solutions over a parameter grid.
///
/// Each item pairs the parameter values of a point with its solution.
#[derive(Debug)]
pub struct Sweep {
    compiler: Compiler,
    duration: f64,
    config: SolverConfig,
    grid: ParameterGrid,
}

impl Sweep {
    /// Points in the grid.
    pub fn points(&self) -> usize {
        self.grid.points()
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }
}

impl Iterator for Sweep {
    type Item = (BTreeMap<Symbol, f64>, Result<Solution>);

    fn next(&mut self) -> Option<Self::Item> {
        let point = self.grid.next()?;
        debug!(point = ?point, "sweep point");
        let solution = Solution::start(self.compiler.clone(), self.duration, point.clone(), self.config.clone());
        Some((point, solution))
    }
}

/// Solve a circuit once for every point of a parameter grid.
///
/// `fixed` values hold at every point; each axis overrides or adds one
/// parameter. Fails up front like [`super::solve_with_config`], when an axis
/// has no values, and when a parameter of the circuit is neither fixed nor
/// swept.
pub fn sweep(
    components: &[Component],
    duration: f64,
    fixed: &BTreeMap<Symbol, f64>,
    axes: Vec<Axis>,
    config: SolverConfig,
) -> Result<Sweep> {
    if let Some(empty) = axes.iter().find(|a| a.values.is_empty()) {
        return Err(SymcircError::InvalidSimulationParam {
            message: format!("sweep of '{}' has no values", empty.symbol),
        });
    }
    let compiler = prepare(components, duration, &config)?;
    let grid = ParameterGrid::new(fixed.clone(), axes);
    if let Some(missing) = compiler.parameters().iter().find(|p| !grid.covers(p)) {
        return Err(SymcircError::MissingParameter {
            symbol: missing.to_string(),
        });
    }

    info!(points = grid.points(), duration, "sweeping parameters");
    Ok(Sweep {
        compiler,
        duration,
        config,
        grid,
    })
}
