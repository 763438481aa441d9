//! Solved unknowns as functions of time.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::{Result, SymcircError};
use crate::expr::{Expr, Symbol};

/// Knots of a sampled solution, sorted by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Curve {
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl Curve {
    pub fn new(times: Vec<f64>, values: Vec<f64>) -> Self {
        Self { times, values }
    }

    pub fn len(&self) -> usize {
        self.times.len().min(self.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First of up to three knots around `t`: the bracketing pair plus the
    /// next knot, or the previous one at the end of the curve.
    fn window_start(&self, t: f64) -> usize {
        let n = self.len();
        if n <= 3 {
            return 0;
        }
        let i = self.times[..n].partition_point(|x| *x <= t).clamp(1, n - 1);
        if i + 1 < n {
            i - 1
        } else {
            i - 2
        }
    }

    /// Value (`order` 0) or derivative of the interpolating quadratic at `t`.
    pub fn interpolate(&self, t: f64, order: u32) -> Option<f64> {
        let n = self.len();
        if n == 0 {
            return None;
        }
        if n == 1 {
            return Some(if order == 0 { self.values[0] } else { 0.0 });
        }
        let start = self.window_start(t);
        let k = n.min(3);
        let xs = &self.times[start..start + k];
        let ys = &self.values[start..start + k];
        if k == 2 {
            let slope = (ys[1] - ys[0]) / (xs[1] - xs[0]);
            return Some(match order {
                0 => ys[0] + slope * (t - xs[0]),
                1 => slope,
                _ => 0.0,
            });
        }
        // Lagrange basis over three knots
        let mut total = 0.0;
        for j in 0..3 {
            let others: Vec<f64> = (0..3).filter(|m| *m != j).map(|m| xs[m]).collect();
            let denom = (xs[j] - others[0]) * (xs[j] - others[1]);
            let basis = match order {
                0 => (t - others[0]) * (t - others[1]),
                1 => 2.0 * t - others[0] - others[1],
                2 => 2.0,
                _ => 0.0,
            };
            total += ys[j] * basis / denom;
        }
        Some(total)
    }
}

/// How a function produces its values.
#[derive(Debug, Clone)]
pub enum FunctionKind {
    /// Closed form in `t`, with the parameter values it is evaluated under
    Symbolic {
        expr: Expr,
        parameters: BTreeMap<Symbol, f64>,
    },
    /// Piecewise-quadratic numeric solution
    Sampled(Curve),
    /// Algebraic expression over other solved functions
    Derived {
        expr: Expr,
        inputs: BTreeMap<Symbol, Function>,
    },
}

/// A solved unknown.
///
/// Cloning is cheap and clones share the evaluation cache.
#[derive(Clone)]
pub struct Function {
    id: Symbol,
    kind: Arc<FunctionKind>,
    cache: Arc<Mutex<HashMap<u64, f64>>>,
}

impl Function {
    pub fn new(id: Symbol, kind: FunctionKind) -> Self {
        Self {
            id,
            kind: Arc::new(kind),
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn symbolic(id: Symbol, expr: Expr, parameters: BTreeMap<Symbol, f64>) -> Self {
        Self::new(id, FunctionKind::Symbolic { expr, parameters })
    }

    pub fn sampled(id: Symbol, curve: Curve) -> Self {
        Self::new(id, FunctionKind::Sampled(curve))
    }

    pub fn derived(id: Symbol, expr: Expr, inputs: BTreeMap<Symbol, Function>) -> Self {
        Self::new(id, FunctionKind::Derived { expr, inputs })
    }

    pub fn id(&self) -> &Symbol {
        &self.id
    }

    pub fn kind(&self) -> &FunctionKind {
        &self.kind
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(*self.kind, FunctionKind::Symbolic { .. })
    }

    /// The closed form, for symbolic functions.
    pub fn expr(&self) -> Option<&Expr> {
        match &*self.kind {
            FunctionKind::Symbolic { expr, .. } => Some(expr),
            _ => None,
        }
    }

    /// Knot times and values, for sampled functions.
    pub fn knots(&self) -> Option<(&[f64], &[f64])> {
        match &*self.kind {
            FunctionKind::Sampled(curve) => Some((&curve.times, &curve.values)),
            _ => None,
        }
    }

    /// Value at `t`, memoised by the exact value of `t`.
    pub fn eval(&self, t: f64) -> Result<f64> {
        let key = t.to_bits();
        if let Some(v) = self.cache.lock().ok().and_then(|c| c.get(&key).copied()) {
            return Ok(v);
        }
        let value = self.eval_derivative(t, 0)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, value);
        }
        Ok(value)
    }

    /// Value of the `order`-th derivative at `t`.
    pub fn eval_derivative(&self, t: f64, order: u32) -> Result<f64> {
        match &*self.kind {
            FunctionKind::Symbolic { expr, parameters } => {
                if order == 0 {
                    expr.eval_with(t, parameters)
                } else {
                    expr.differentiate_n(order).eval_with(t, parameters)
                }
            }
            FunctionKind::Sampled(curve) => {
                curve
                    .interpolate(t, order)
                    .ok_or_else(|| SymcircError::UnresolvedFunction {
                        symbol: self.id.to_string(),
                    })
            }
            FunctionKind::Derived { expr, inputs } => {
                let expr = if order == 0 {
                    expr.clone()
                } else {
                    expr.differentiate_n(order)
                };
                expr.eval(t, &|e, at| match e {
                    Expr::Func { sym, order } => inputs.get(sym).and_then(|f| {
                        if *order == 0 {
                            f.eval(at).ok()
                        } else {
                            f.eval_derivative(at, *order).ok()
                        }
                    }),
                    Expr::Initial { sym, order } => {
                        inputs.get(sym).and_then(|f| f.eval_derivative(0.0, *order).ok())
                    }
                    _ => None,
                })
            }
        }
    }

    /// `n` evenly spaced samples over `[0, duration]`, endpoints included.
    pub fn sample(&self, n: usize, duration: f64) -> Result<Vec<(f64, f64)>> {
        sample_times(n, duration)
            .map(|t| Ok((t, self.eval(t)?)))
            .collect()
    }
}

/// `n` evenly spaced times over `[0, duration]`.
pub fn sample_times(n: usize, duration: f64) -> impl Iterator<Item = f64> {
    let last = n.saturating_sub(1).max(1) as f64;
    (0..n).map(move |i| duration * i as f64 / last)
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &*self.kind {
            FunctionKind::Symbolic { .. } => "symbolic",
            FunctionKind::Sampled(_) => "sampled",
            FunctionKind::Derived { .. } => "derived",
        };
        f.debug_struct("Function")
            .field("id", &self.id)
            .field("kind", &kind)
            .finish()
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.kind {
            FunctionKind::Symbolic { expr, .. } => write!(f, "{}(t) = {}", self.id, expr),
            FunctionKind::Sampled(curve) => write!(f, "{}(t) sampled at {} knots", self.id, curve.len()),
            FunctionKind::Derived { expr, .. } => write!(f, "{}(t) = {}", self.id, expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn parabola() -> Curve {
        let times: Vec<f64> = (0..10).map(|i| i as f64 * 0.5).collect();
        let values = times.iter().map(|t| t * t).collect();
        Curve::new(times, values)
    }

    #[test]
    fn test_interpolation_exact_on_quadratics() {
        let f = Function::sampled(Symbol::new("x"), parabola());
        for t in [0.0, 0.2, 1.3, 4.5, 4.4] {
            assert_relative_eq!(f.eval(t).unwrap(), t * t, epsilon = 1e-12);
        }
        assert_relative_eq!(f.eval_derivative(1.3, 1).unwrap(), 2.6, epsilon = 1e-12);
        assert_relative_eq!(f.eval_derivative(3.0, 2).unwrap(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_knots_are_reproduced() {
        let curve = Curve::new(vec![0.0, 1.0, 3.0, 4.0], vec![1.0, -2.0, 5.0, 0.5]);
        let f = Function::sampled(Symbol::new("x"), curve.clone());
        for (t, v) in curve.times.iter().zip(&curve.values) {
            assert_relative_eq!(f.eval(*t).unwrap(), *v, epsilon = 1e-12);
        }
        let (times, _) = f.knots().unwrap();
        assert_eq!(times.len(), 4);
    }

    #[test]
    fn test_two_knots_are_linear() {
        let f = Function::sampled(Symbol::new("x"), Curve::new(vec![0.0, 2.0], vec![0.0, 4.0]));
        assert_relative_eq!(f.eval(0.5).unwrap(), 1.0);
    }

    #[test]
    fn test_symbolic_needs_parameters() {
        let expr = Expr::param("k") * Expr::time();
        let unbound = Function::symbolic(Symbol::new("x"), expr.clone(), BTreeMap::new());
        assert!(matches!(unbound.eval(1.0), Err(SymcircError::UnboundParameter { .. })));

        let bound = Function::symbolic(Symbol::new("x"), expr, BTreeMap::from([(Symbol::new("k"), 3.0)]));
        assert_relative_eq!(bound.eval(2.0).unwrap(), 6.0);
    }

    #[test]
    fn test_derived_from_inputs() {
        let x = Function::sampled(Symbol::new("x"), parabola());
        let y = Function::derived(
            Symbol::new("y"),
            Expr::num(2.0) * Expr::func("x") + Expr::one(),
            BTreeMap::from([(Symbol::new("x"), x)]),
        );
        assert_relative_eq!(y.eval(2.0).unwrap(), 9.0, epsilon = 1e-12);
        // second lookup comes from the cache
        assert_relative_eq!(y.eval(2.0).unwrap(), 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sample_endpoints() {
        let f = Function::symbolic(Symbol::new("x"), Expr::time(), BTreeMap::new());
        let samples = f.sample(5, 2.0).unwrap();
        assert_eq!(samples.len(), 5);
        assert_eq!(samples[0], (0.0, 0.0));
        assert_relative_eq!(samples[4].0, 2.0);
    }
}
