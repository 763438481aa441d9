//! Closed-form solutions of low-order linear ODEs.

use tracing::debug;

use crate::compiler::DerivedEquation;
use crate::error::{Result, SymcircError};
use crate::expr::{solve_linear, Expr, Poly};

/// Relative size below which the discriminant counts as zero.
const REPEATED_ROOT_TOLERANCE: f64 = 1e-12;

/// Coefficients of `a₂ f'' + a₁ f' + a₀ f + forcing = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LinearOde {
    coefficients: [f64; 3],
    forcing: f64,
}

impl LinearOde {
    fn order(&self) -> Option<u32> {
        (0..3u32).rev().find(|k| self.coefficients[*k as usize] != 0.0)
    }
}

/// Read the ODE as a constant-coefficient linear equation with constant
/// forcing, or explain why it is not one.
fn classify(eq: &DerivedEquation) -> Result<LinearOde> {
    let fail = |reason: &str| SymcircError::no_symbolic_form(&eq.symbol, reason);
    let mut ode = LinearOde {
        coefficients: [0.0; 3],
        forcing: 0.0,
    };
    for (monomial, c) in Poly::from_expr(&eq.ode).terms() {
        let mut atoms = monomial.iter();
        match (atoms.next(), atoms.next()) {
            (None, _) => ode.forcing += c,
            (Some((Expr::Func { sym, order }, 1)), None) if *sym == eq.symbol => {
                if *order > 2 {
                    return Err(fail("derivative of order above two"));
                }
                ode.coefficients[*order as usize] += c;
            }
            (Some((Expr::Func { .. }, _)), None) => return Err(fail("not linear in the unknown")),
            _ => return Err(fail("time-dependent or non-constant coefficients")),
        }
    }
    Ok(ode)
}

/// Solve a derived equation in closed form.
///
/// Handles linear ODEs with constant coefficients and constant forcing up
/// to order two. The general solution is built with integration constants,
/// which are then matched to the equation's initial values.
pub fn solve_closed_form(eq: &DerivedEquation) -> Result<Expr> {
    let ode = classify(eq)?;
    let Some(order) = ode.order() else {
        return Err(SymcircError::no_symbolic_form(&eq.symbol, "equation does not involve the unknown"));
    };
    let [a0, a1, a2] = ode.coefficients;
    let c = ode.forcing;
    let t = Expr::time;
    let k1 = Expr::param("#k1");
    let k2 = Expr::param("#k2");

    let (general, constants) = match order {
        0 => (Expr::num(-c / a0), vec![]),
        1 => {
            let general = if a0 == 0.0 {
                k1.clone() + Expr::num(-c / a1) * t()
            } else {
                k1.clone() * Expr::exp(Expr::num(-a0 / a1) * t()) + Expr::num(-c / a0)
            };
            (general, vec![k1])
        }
        _ => {
            let particular = if a0 != 0.0 {
                Expr::num(-c / a0)
            } else if a1 != 0.0 {
                Expr::num(-c / a1) * t()
            } else {
                Expr::num(-c / (2.0 * a2)) * Expr::pow(t(), 2)
            };
            let disc = a1 * a1 - 4.0 * a2 * a0;
            let scale = a1 * a1 + (4.0 * a2 * a0).abs();
            let homogeneous = if disc.abs() <= REPEATED_ROOT_TOLERANCE * scale {
                let r = -a1 / (2.0 * a2);
                (k1.clone() + k2.clone() * t()) * Expr::exp(Expr::num(r) * t())
            } else if disc > 0.0 {
                let root = disc.sqrt();
                let r1 = (-a1 + root) / (2.0 * a2);
                let r2 = (-a1 - root) / (2.0 * a2);
                k1.clone() * Expr::exp(Expr::num(r1) * t()) + k2.clone() * Expr::exp(Expr::num(r2) * t())
            } else {
                let alpha = -a1 / (2.0 * a2);
                let beta = (-disc).sqrt() / (2.0 * a2);
                Expr::exp(Expr::num(alpha) * t())
                    * (k1.clone() * Expr::cos(Expr::num(beta) * t())
                        + k2.clone() * Expr::sin(Expr::num(beta) * t()))
            };
            (homogeneous + particular, vec![k1, k2])
        }
    };

    let mut conditions = Vec::with_capacity(constants.len());
    let mut derivative = general.clone();
    for k in 0..constants.len() as u32 {
        let known = eq
            .initial_value(k)
            .ok_or_else(|| SymcircError::no_symbolic_form(&eq.symbol, format!("f^({})(0) is unknown", k)))?;
        let value = known.eval_at(0.0)?;
        conditions.push(Poly::from_expr(&(derivative.at_zero() - Expr::num(value))));
        derivative = derivative.differentiate();
    }

    let solution = solve_linear(conditions, &constants);
    let mut closed = general;
    for constant in &constants {
        let value = solution
            .get(constant)
            .ok_or_else(|| SymcircError::no_symbolic_form(&eq.symbol, "integration constants are not determined"))?;
        if let Expr::Param(name) = constant {
            closed = closed.substitute(name, &value.to_expr());
        }
    }
    let closed = closed.normalize();

    debug!(symbol = %eq.symbol, order, solution = %closed, "closed form");
    Ok(closed)
}
