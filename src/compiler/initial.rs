//! Differential form and initial values of a decoupled equation.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Result, SymcircError};
use crate::expr::{solve_linear, Equation, Expr, Poly, Symbol};

/// Bound on the number of differentiations needed to clear all integrals.
const MAX_DIFFERENTIATIONS: usize = 8;

/// A decoupled unknown as an ordinary differential equation.
#[derive(Debug, Clone)]
pub struct DerivedEquation {
    pub symbol: Symbol,
    /// Integral-free residual, `ode = 0`
    pub ode: Expr,
    /// Highest derivative order of the unknown in `ode`
    pub order: u32,
    /// `f^(k)(0)` for every `k` that could be determined
    pub initial: BTreeMap<u32, Expr>,
}

impl DerivedEquation {
    /// Value of `f^(k)(0)`, if known.
    pub fn initial_value(&self, k: u32) -> Option<&Expr> {
        self.initial.get(&k)
    }

    /// Replace every parameter by a value.
    pub fn bind(&self, bindings: &BTreeMap<Symbol, Expr>) -> DerivedEquation {
        DerivedEquation {
            symbol: self.symbol.clone(),
            ode: self.ode.substitute_all(bindings).normalize(),
            order: self.order,
            initial: self
                .initial
                .iter()
                .map(|(k, v)| (*k, v.substitute_all(bindings).normalize()))
                .collect(),
        }
    }
}

/// Turn the integral-form equation of `symbol` into an ODE and find
/// `f(0)`, `f'(0)`, `f''(0)` (and further values up to the ODE's order).
///
/// Before each differentiation the equation is evaluated at `t = 0`, which
/// is where the integral form carries its initial state. The ODE and, for
/// orders below two, its derivatives are evaluated at `t = 0` as well. The
/// resulting linear system is solved for the initial values.
pub fn initial_conditions(symbol: &Symbol, equation: &Equation) -> Result<DerivedEquation> {
    let mut current = equation.residual().to_expr();
    let mut conditions: Vec<Poly> = Vec::new();

    let mut rounds = 0;
    while current.has_integral() {
        if rounds == MAX_DIFFERENTIATIONS {
            return Err(SymcircError::Underdetermined {
                symbol: symbol.to_string(),
            });
        }
        conditions.push(Poly::from_expr(&current.at_zero()));
        current = current.differentiate().normalize();
        rounds += 1;
    }

    let ode = current;
    let order = ode.max_order(symbol).unwrap_or(0);

    let mut derivative = ode.clone();
    for _ in 0..(3 - order.min(2)) {
        conditions.push(Poly::from_expr(&derivative.at_zero()));
        derivative = derivative.differentiate();
    }

    let targets: Vec<Expr> = (0..=order.max(2)).map(|k| Expr::initial(symbol.clone(), k)).collect();
    let solution = solve_linear(conditions, &targets);

    let initial: BTreeMap<u32, Expr> = targets
        .iter()
        .enumerate()
        .filter_map(|(k, target)| {
            let value = solution.get(target)?.to_expr();
            // still tied to a value that could not be determined
            let free = targets.iter().any(|t| value.mentions(t));
            (!free).then_some((k as u32, value))
        })
        .collect();

    debug!(
        symbol = %symbol,
        order,
        ode = %ode,
        known = initial.len(),
        "initial conditions"
    );

    Ok(DerivedEquation {
        symbol: symbol.clone(),
        ode,
        order,
        initial,
    })
}
