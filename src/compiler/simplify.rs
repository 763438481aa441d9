//! Algebraic elimination over the invariant equations.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Result, SymcircError};
use crate::expr::{Equation, Expr, Poly, Symbol, System};

/// Outcome of [`simplify`].
#[derive(Debug, Clone, Default)]
pub struct Simplification {
    /// Variables expressed through the variables that could not be resolved
    pub resolved: BTreeMap<Symbol, Expr>,
    /// Equations left over, in residual form `expr = 0`
    pub remaining: System,
}

/// Resolve as many variables as possible from an algebraic system.
///
/// Variables are visited in the given order. Each takes the first
/// equation it can be isolated from; its value is substituted into every
/// other equation and into the values found so far. Equations that reduce
/// to `0 = 0` are dropped, equations that reduce to a non-zero constant are
/// a [`SymcircError::Contradiction`]. Passes repeat until one resolves nothing.
pub fn simplify(system: &System, variables: &[Symbol]) -> Result<Simplification> {
    // (equation as written, current residual)
    let mut pending: Vec<(Equation, Poly)> = Vec::with_capacity(system.len());
    for eq in system {
        let residual = eq.residual();
        if residual.is_zero() {
            continue;
        }
        if residual.as_constant().is_some() {
            return Err(SymcircError::contradiction(eq, "0 = 0"));
        }
        pending.push((eq.clone(), residual));
    }

    let mut resolved: Vec<(Symbol, Poly)> = Vec::new();
    loop {
        let mut progress = false;
        for var in variables {
            if resolved.iter().any(|(s, _)| s == var) {
                continue;
            }
            let target = Expr::func(var.clone());
            let Some((index, value)) = pending
                .iter()
                .enumerate()
                .find_map(|(i, (_, r))| r.isolate(&target).map(|v| (i, v)))
            else {
                continue;
            };

            let (origin, _) = pending.remove(index);
            let replacement = value.to_expr();
            debug!(symbol = %var, from = %origin, value = %replacement, "resolved");

            let mut reduced = Vec::with_capacity(pending.len());
            for (eq, residual) in pending {
                let residual = residual.substitute_atom(&target, &replacement);
                if residual.is_zero() {
                    debug!(equation = %eq, "redundant");
                    continue;
                }
                if residual.as_constant().is_some() {
                    return Err(SymcircError::contradiction(&eq, &origin));
                }
                reduced.push((eq, residual));
            }
            pending = reduced;

            for (_, v) in resolved.iter_mut() {
                *v = v.substitute_atom(&target, &replacement);
            }
            resolved.push((var.clone(), value));
            progress = true;
        }
        if !progress {
            break;
        }
    }

    Ok(Simplification {
        resolved: resolved.into_iter().map(|(s, v)| (s, v.to_expr())).collect(),
        remaining: pending
            .into_iter()
            .map(|(_, r)| Equation::new(r.to_expr(), Expr::zero()))
            .fold(System::new(), System::merge),
    })
}
