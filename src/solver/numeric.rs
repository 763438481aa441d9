//! Adaptive integration with locally fitted quadratic segments.
//!
//! Between two knots the solution is `f(t₁ + τ) = a τ² + b τ + c`, anchored
//! at the segment's end knot `t₁`, so `c` is the value and `b` the slope
//! there. The next triple follows from three linear conditions: the ODE
//! holds at the new knot, and value and slope are continuous at the
//! previous one. Those are solved once, symbolically, into a [`Recurrence`]
//! that each step only evaluates.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, warn};

use crate::compiler::DerivedEquation;
use crate::error::{Result, SymcircError};
use crate::expr::{solve_linear, Expr, Poly, Symbol};

use super::thinning::{thin, Thinning};
use super::SolverConfig;

const A: &str = "#a";
const B: &str = "#b";
const C: &str = "#c";
const NEXT_A: &str = "#a'";
const NEXT_B: &str = "#b'";
const NEXT_C: &str = "#c'";
const T0: &str = "#t0";
const DT: &str = "#dt";

/// Next segment coefficients as functions of the previous ones, the
/// previous knot time and the step.
#[derive(Debug, Clone)]
pub struct Recurrence {
    pub a: Expr,
    pub b: Expr,
    pub c: Expr,
}

impl Recurrence {
    /// Derive the recurrence of a derived equation with bound parameters.
    pub fn new(eq: &DerivedEquation) -> Result<Self> {
        let symbol = &eq.symbol;
        if let Some(p) = eq.ode.params().into_iter().next() {
            return Err(SymcircError::UnboundParameter { symbol: p.to_string() });
        }
        if eq.order > 2 {
            return Err(SymcircError::no_recurrence(symbol, "derivative of order above two"));
        }

        let p = Expr::param;
        let next_knot = p(T0) + p(DT);
        let at_next_knot = eq.ode.map(&mut |e| match e {
            Expr::Time => Some(next_knot.clone()),
            Expr::Func { sym, order } if sym == symbol => Some(match order {
                0 => p(NEXT_C),
                1 => p(NEXT_B),
                _ => Expr::num(2.0) * p(NEXT_A),
            }),
            _ => None,
        });
        if !at_next_knot.functions().is_empty() {
            return Err(SymcircError::no_recurrence(symbol, "equation mentions other unknowns"));
        }

        let dt = p(DT);
        let residuals = vec![
            Poly::from_expr(&at_next_knot),
            // value at the previous knot, τ = -dt
            Poly::from_expr(
                &(p(NEXT_A) * Expr::pow(dt.clone(), 2) - p(NEXT_B) * dt.clone() + p(NEXT_C) - p(C)),
            ),
            // slope at the previous knot
            Poly::from_expr(&(p(NEXT_B) - Expr::num(2.0) * p(NEXT_A) * dt - p(B))),
        ];
        let targets = [p(NEXT_A), p(NEXT_B), p(NEXT_C)];
        let solution = solve_linear(residuals, &targets);

        let value = |target: &Expr| -> Result<Expr> {
            solution
                .get(target)
                .map(Poly::to_expr)
                .ok_or_else(|| SymcircError::no_recurrence(symbol, format!("{} is not determined", target)))
        };
        let recurrence = Self {
            a: value(&targets[0])?,
            b: value(&targets[1])?,
            c: value(&targets[2])?,
        };
        debug!(
            symbol = %symbol,
            a = %recurrence.a,
            b = %recurrence.b,
            c = %recurrence.c,
            "step recurrence"
        );
        Ok(recurrence)
    }

    /// Coefficients of the segment ending at `t0 + dt`.
    pub fn next(&self, segment: Segment, t0: f64, dt: f64) -> Result<Segment> {
        let lookup = |e: &Expr, _: f64| match e {
            Expr::Param(s) => match s.name() {
                A => Some(segment.a),
                B => Some(segment.b),
                C => Some(segment.c),
                T0 => Some(t0),
                DT => Some(dt),
                _ => None,
            },
            _ => None,
        };
        Ok(Segment {
            a: self.a.eval(t0, &lookup)?,
            b: self.b.eval(t0, &lookup)?,
            c: self.c.eval(t0, &lookup)?,
        })
    }
}

/// Quadratic segment anchored at its end knot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Segment {
    fn is_finite(&self) -> bool {
        self.a.is_finite() && self.b.is_finite() && self.c.is_finite()
    }
}

/// Result of one attempted step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// A knot was added at `t`; `dt` is the step that reached it.
    Accepted { t: f64, value: f64, dt: f64 },
    /// The step was too coarse; `dt` is the smaller step to try next.
    Rejected { dt: f64 },
}

/// Adaptive stepping state for one unknown.
#[derive(Debug, Clone)]
pub struct Stepper {
    symbol: Symbol,
    recurrence: Recurrence,
    segment: Segment,
    t: f64,
    dt: f64,
    small_error: f64,
    large_error: f64,
    min_step: f64,
    max_step: f64,
}

impl Stepper {
    /// Start at `t = 0` from the equation's initial values; missing values
    /// start at zero.
    pub fn new(eq: &DerivedEquation, config: &SolverConfig) -> Result<Self> {
        let recurrence = Recurrence::new(eq)?;
        let initial = |k: u32| -> Result<f64> {
            match eq.initial_value(k) {
                Some(v) => v.eval_at(0.0),
                None => Ok(0.0),
            }
        };
        let segment = Segment {
            a: initial(2)? / 2.0,
            b: initial(1)?,
            c: initial(0)?,
        };
        Ok(Self {
            symbol: eq.symbol.clone(),
            recurrence,
            segment,
            t: 0.0,
            dt: config.min_step,
            small_error: config.small_error,
            large_error: config.large_error,
            min_step: config.min_step,
            max_step: config.max_step,
        })
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn value(&self) -> f64 {
        self.segment.c
    }

    /// Step that the next attempt will use.
    pub fn step_size(&self) -> f64 {
        self.dt
    }

    /// Attempt one step.
    pub fn step(&mut self) -> Result<StepOutcome> {
        let dt = self.dt;
        let next = self.recurrence.next(self.segment, self.t, dt)?;
        if !next.is_finite() {
            return Err(SymcircError::NumericDivergence {
                symbol: self.symbol.to_string(),
                time: self.t + dt,
            });
        }

        let error = (self.segment.b - next.b).powi(2);
        if error > self.large_error && dt > self.min_step {
            self.dt = (dt / 2.0).max(self.min_step);
            return Ok(StepOutcome::Rejected { dt: self.dt });
        }
        if error > self.large_error {
            warn!(symbol = %self.symbol, t = self.t, "step error above bound at minimum step");
        } else if error < self.small_error {
            self.dt = (dt * 2.0).min(self.max_step);
        }

        self.segment = next;
        self.t += dt;
        Ok(StepOutcome::Accepted {
            t: self.t,
            value: next.c,
            dt,
        })
    }
}

/// Sampled solution: knot times and values.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

/// Integrate a derived equation over `[0, duration]`.
///
/// The knot list is thinned every `thinning_batch` accepted steps and once
/// at the end. Fails with [`SymcircError::TimedOut`] once `deadline` passes.
pub fn integrate(
    eq: &DerivedEquation,
    duration: f64,
    config: &SolverConfig,
    deadline: Option<Instant>,
) -> Result<Trajectory> {
    let started = Instant::now();
    let mut stepper = Stepper::new(eq, config)?;
    let mut out = Trajectory {
        times: vec![0.0],
        values: vec![stepper.value()],
    };
    let thinning = |values: &[f64]| Thinning::for_curve(config.thinning_angle, duration, values);

    let mut accepted = 0usize;
    let mut rejected = 0usize;
    let mut thinned_to = 1usize;
    let mut since_thinning = 0usize;
    while stepper.time() < duration {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(SymcircError::TimedOut {
                symbol: eq.symbol.to_string(),
                strategy: "numeric",
                seconds: started.elapsed().as_secs_f64(),
            });
        }
        match stepper.step()? {
            StepOutcome::Accepted { t, value, .. } => {
                out.times.push(t);
                out.values.push(value);
                accepted += 1;
                since_thinning += 1;
            }
            StepOutcome::Rejected { .. } => rejected += 1,
        }
        if since_thinning == config.thinning_batch {
            let rule = thinning(&out.values);
            thin(&mut out.times, &mut out.values, thinned_to, &rule);
            thinned_to = out.times.len() - 1;
            since_thinning = 0;
        }
    }
    let rule = thinning(&out.values);
    let removed = thin(&mut out.times, &mut out.values, thinned_to, &rule);

    debug!(
        symbol = %eq.symbol,
        accepted,
        rejected,
        removed,
        knots = out.times.len(),
        "numeric integration finished"
    );
    Ok(out)
}

/// Bind parameter values into a derived equation.
pub fn bind_parameters(eq: &DerivedEquation, values: &BTreeMap<Symbol, f64>) -> DerivedEquation {
    let bindings = values
        .iter()
        .map(|(s, v)| (s.clone(), Expr::num(*v)))
        .collect();
    eq.bind(&bindings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn decay(rate: f64, start: f64) -> DerivedEquation {
        // x' + rate x = 0
        let x = |k| Expr::derivative("x", k);
        DerivedEquation {
            symbol: Symbol::new("x"),
            ode: x(1) + Expr::num(rate) * x(0),
            order: 1,
            initial: BTreeMap::from([
                (0, Expr::num(start)),
                (1, Expr::num(-rate * start)),
                (2, Expr::num(rate * rate * start)),
            ]),
        }
    }

    #[test]
    fn test_recurrence_is_trapezoidal() {
        // for x' = -x the value update is c (1 - dt/2) / (1 + dt/2)
        let r = Recurrence::new(&decay(1.0, 1.0)).unwrap();
        let next = r
            .next(Segment { a: 0.5, b: -1.0, c: 1.0 }, 0.0, 0.1)
            .unwrap();
        assert_relative_eq!(next.c, 0.95 / 1.05, max_relative = 1e-12);
        assert_relative_eq!(next.b, -next.c, max_relative = 1e-12);
    }

    #[test]
    fn test_exponential_decay() {
        let config = SolverConfig::default();
        let out = integrate(&decay(1.0, 1.0), 3.0, &config, None).unwrap();
        assert!(*out.times.last().unwrap() >= 3.0);
        for (t, v) in out.times.iter().zip(&out.values) {
            assert!((v - (-t).exp()).abs() < 1e-3, "x({}) = {}", t, v);
        }
    }

    #[test]
    fn test_step_bounds() {
        let config = SolverConfig::default();
        let mut stepper = Stepper::new(&decay(1.0, 1.0), &config).unwrap();
        let mut last_dt = stepper.step_size();
        while stepper.time() < 2.0 {
            match stepper.step().unwrap() {
                StepOutcome::Accepted { dt, .. } => {
                    assert!(dt >= config.min_step && dt <= config.max_step);
                }
                StepOutcome::Rejected { dt } => assert!(dt < last_dt),
            }
            last_dt = stepper.step_size();
        }
    }

    #[test]
    fn test_unbound_parameter() {
        let mut eq = decay(1.0, 1.0);
        eq.ode = eq.ode + Expr::param("k");
        assert!(matches!(
            Recurrence::new(&eq),
            Err(SymcircError::UnboundParameter { .. })
        ));
    }

    #[test]
    fn test_divergence_reported() {
        let mut eq = decay(1.0, 1.0);
        eq.initial.insert(0, Expr::num(f64::NAN));
        let result = integrate(&eq, 1.0, &SolverConfig::default(), None);
        assert!(matches!(result, Err(SymcircError::NumericDivergence { .. })));
    }
}
