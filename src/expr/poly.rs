//! Canonical sum-of-monomials form.
//!
//! A [`Poly`] maps monomials (products of atoms raised to integer powers) to
//! numeric coefficients. Atoms are the time variable, parameters, unknown
//! functions, initial values, normalised integrals, normalised elementary
//! function applications and the reciprocal of a sum that could not be
//! expanded. Converting an [`Expr`] into this form collects like terms and
//! cancels opposites, which is all the algebra the compiler needs.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use super::Expr;

/// Relative size below which a summed coefficient counts as cancelled.
const CANCEL_TOLERANCE: f64 = 1e-12;

/// Product of atoms with their (non-zero) powers.
pub type Monomial = BTreeMap<Expr, i32>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Poly {
    terms: BTreeMap<Monomial, f64>,
}

/// Result of [`solve_linear`].
#[derive(Debug, Clone, Default)]
pub struct LinearSolution {
    /// Targets in the order they were isolated, with their values
    pub solved: Vec<(Expr, Poly)>,
    /// Residuals not used to isolate anything
    pub leftover: Vec<Poly>,
}

impl LinearSolution {
    pub fn get(&self, target: &Expr) -> Option<&Poly> {
        self.solved.iter().find(|(t, _)| t == target).map(|(_, v)| v)
    }
}

impl Poly {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn constant(c: f64) -> Self {
        Self::term(Monomial::new(), c)
    }

    fn atom(atom: Expr) -> Self {
        let mut m = Monomial::new();
        m.insert(atom, 1);
        Self::term(m, 1.0)
    }

    fn term(monomial: Monomial, coefficient: f64) -> Self {
        let mut terms = BTreeMap::new();
        if coefficient != 0.0 {
            terms.insert(monomial, coefficient);
        }
        Self { terms }
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, f64)> {
        self.terms.iter().map(|(m, c)| (m, *c))
    }

    /// The value, if the polynomial has no atoms.
    pub fn as_constant(&self) -> Option<f64> {
        match self.terms.len() {
            0 => Some(0.0),
            1 => self
                .terms
                .iter()
                .next()
                .and_then(|(m, c)| m.is_empty().then_some(*c)),
            _ => None,
        }
    }

    /// Coefficient of a monomial, zero when absent.
    pub fn coefficient(&self, monomial: &Monomial) -> f64 {
        self.terms.get(monomial).copied().unwrap_or(0.0)
    }

    fn accumulate(terms: &mut BTreeMap<Monomial, f64>, monomial: Monomial, coefficient: f64) {
        if coefficient == 0.0 {
            return;
        }
        match terms.entry(monomial) {
            Entry::Vacant(slot) => {
                slot.insert(coefficient);
            }
            Entry::Occupied(mut slot) => {
                let old = *slot.get();
                let new = old + coefficient;
                if new.abs() <= CANCEL_TOLERANCE * old.abs().max(coefficient.abs()) {
                    slot.remove();
                } else {
                    *slot.get_mut() = new;
                }
            }
        }
    }

    pub fn add(&self, other: &Poly) -> Poly {
        let mut terms = self.terms.clone();
        for (m, c) in &other.terms {
            Self::accumulate(&mut terms, m.clone(), *c);
        }
        Poly { terms }
    }

    pub fn sub(&self, other: &Poly) -> Poly {
        self.add(&other.scale(-1.0))
    }

    pub fn scale(&self, k: f64) -> Poly {
        if k == 0.0 {
            return Poly::zero();
        }
        Poly {
            terms: self.terms.iter().map(|(m, c)| (m.clone(), c * k)).collect(),
        }
    }

    pub fn mul(&self, other: &Poly) -> Poly {
        let mut terms = BTreeMap::new();
        for (m1, c1) in &self.terms {
            for (m2, c2) in &other.terms {
                let mut m = m1.clone();
                for (atom, p) in m2 {
                    let power = m.get(atom).copied().unwrap_or(0) + p;
                    if power == 0 {
                        m.remove(atom);
                    } else {
                        m.insert(atom.clone(), power);
                    }
                }
                Self::accumulate(&mut terms, m, c1 * c2);
            }
        }
        Poly { terms }
    }

    pub fn powi(&self, n: i32) -> Poly {
        if n == 0 {
            return Poly::constant(1.0);
        }
        if n < 0 {
            return self.reciprocal().powi(-n);
        }
        if let Some((m, c)) = self.single() {
            let m = m.iter().map(|(atom, p)| (atom.clone(), p * n)).collect();
            return Poly::term(m, c.powi(n));
        }
        (1..n).fold(self.clone(), |acc, _| acc.mul(self))
    }

    fn single(&self) -> Option<(&Monomial, f64)> {
        if self.terms.len() == 1 {
            self.terms.iter().next().map(|(m, c)| (m, *c))
        } else {
            None
        }
    }

    /// `1 / self`.
    ///
    /// A single term is inverted exactly. A sum becomes an opaque reciprocal
    /// atom, divided through so the sum's leading coefficient is exactly one.
    /// A base in that form is left unchanged by a second pass.
    pub fn reciprocal(&self) -> Poly {
        if self.is_zero() {
            return Poly::constant(f64::INFINITY);
        }
        if let Some((m, c)) = self.single() {
            let mut out = Poly::constant(1.0 / c);
            let mut plain = Monomial::new();
            for (atom, p) in m {
                match atom {
                    Expr::Pow(base, -1) => out = out.mul(&Poly::from_expr(base).powi(*p)),
                    _ => {
                        plain.insert(atom.clone(), -p);
                    }
                }
            }
            return out.mul(&Poly::term(plain, 1.0));
        }
        let lead = self.terms.values().next().copied().unwrap_or(1.0);
        let base = Poly {
            terms: self.terms.iter().map(|(m, c)| (m.clone(), c / lead)).collect(),
        }
        .to_expr();
        let mut m = Monomial::new();
        m.insert(Expr::Pow(Box::new(base), -1), 1);
        Poly::term(m, 1.0 / lead)
    }

    /// `∫₀ᵗ self dt'`, term by term.
    fn integrate(&self) -> Poly {
        let mut out = Poly::zero();
        for (m, c) in &self.terms {
            let (varying, constant): (Monomial, Monomial) =
                m.iter().map(|(a, p)| (a.clone(), *p)).partition(|(a, _)| a.depends_on_time());
            let constant = Poly::term(constant, *c);
            let integrated = if varying.is_empty() {
                Poly::atom(Expr::Time)
            } else if let Some(n) = power_of_time(&varying).filter(|n| *n != -1) {
                Poly::atom(Expr::Time)
                    .powi(n + 1)
                    .scale(1.0 / (n + 1) as f64)
            } else {
                Poly::atom(Expr::Integral(Box::new(Poly::term(varying, 1.0).to_expr())))
            };
            out = out.add(&constant.mul(&integrated));
        }
        out
    }

    pub fn from_expr(expr: &Expr) -> Poly {
        match expr {
            Expr::Num(c) => Poly::constant(c.value()),
            Expr::Time | Expr::Param(_) | Expr::Func { .. } | Expr::Initial { .. } => Poly::atom(expr.clone()),
            Expr::Integral(inner) => Poly::from_expr(inner).integrate(),
            Expr::Apply(function, inner) => {
                let arg = Poly::from_expr(inner);
                match arg.as_constant() {
                    Some(x) => Poly::constant(function.eval(x)),
                    None => Poly::atom(Expr::Apply(*function, Box::new(arg.to_expr()))),
                }
            }
            Expr::Sum(items) => items
                .iter()
                .fold(Poly::zero(), |acc, e| acc.add(&Poly::from_expr(e))),
            Expr::Product(items) => items
                .iter()
                .fold(Poly::constant(1.0), |acc, e| acc.mul(&Poly::from_expr(e))),
            Expr::Pow(base, n) => Poly::from_expr(base).powi(*n),
        }
    }

    pub fn to_expr(&self) -> Expr {
        Expr::sum(self.terms.iter().map(|(m, c)| {
            Expr::product(
                std::iter::once(Expr::num(*c)).chain(m.iter().map(|(atom, p)| Expr::pow(atom.clone(), *p))),
            )
        }))
    }

    /// Solve `self = 0` for `target`.
    ///
    /// Succeeds when every term holds `target` at power one or not at all,
    /// and no other atom of those terms refers to it.
    pub fn isolate(&self, target: &Expr) -> Option<Poly> {
        let mut coefficient = Poly::zero();
        let mut rest = Poly::zero();
        for (m, c) in &self.terms {
            let mut others = m.clone();
            let power = others.remove(target);
            if others.keys().any(|atom| atom.mentions(target)) {
                return None;
            }
            match power {
                None => Self::accumulate(&mut rest.terms, others, *c),
                Some(1) => Self::accumulate(&mut coefficient.terms, others, *c),
                Some(_) => return None,
            }
        }
        if coefficient.is_zero() {
            return None;
        }
        Some(rest.scale(-1.0).mul(&coefficient.reciprocal()))
    }

    /// True if any atom refers to `target` (see [`Expr::mentions`]).
    pub fn mentions(&self, target: &Expr) -> bool {
        self.terms
            .keys()
            .any(|m| m.keys().any(|atom| atom.mentions(target)))
    }

    /// Replace an atom by an expression and renormalise.
    pub fn substitute_atom(&self, target: &Expr, replacement: &Expr) -> Poly {
        if !self.mentions(target) {
            return self.clone();
        }
        Poly::from_expr(&self.to_expr().substitute_atom(target, replacement))
    }
}

/// The exponent `n` if the monomial is exactly `t^n`.
fn power_of_time(m: &Monomial) -> Option<i32> {
    match (m.len(), m.get(&Expr::Time)) {
        (1, Some(n)) => Some(*n),
        _ => None,
    }
}

/// Solve a set of residuals (each `= 0`) for the given targets.
///
/// Targets are isolated one at a time from the first residual that allows
/// it; each value is substituted into the remaining residuals and into the
/// values found so far. Passes repeat until nothing more can be isolated.
pub fn solve_linear(mut residuals: Vec<Poly>, targets: &[Expr]) -> LinearSolution {
    let mut solved: Vec<(Expr, Poly)> = Vec::new();
    loop {
        let mut progress = false;
        for target in targets {
            if solved.iter().any(|(t, _)| t == target) {
                continue;
            }
            residuals.retain(|r| !r.is_zero());
            let found = residuals
                .iter()
                .enumerate()
                .find_map(|(i, r)| r.isolate(target).map(|v| (i, v)));
            if let Some((index, value)) = found {
                residuals.remove(index);
                let replacement = value.to_expr();
                for r in residuals.iter_mut() {
                    *r = r.substitute_atom(target, &replacement);
                }
                for (_, v) in solved.iter_mut() {
                    *v = v.substitute_atom(target, &replacement);
                }
                solved.push((target.clone(), value));
                progress = true;
            }
        }
        if !progress {
            break;
        }
    }
    residuals.retain(|r| !r.is_zero());
    LinearSolution {
        solved,
        leftover: residuals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn x() -> Expr {
        Expr::func("x")
    }

    #[test]
    fn test_like_terms_cancel() {
        let e = Expr::param("R") * x() - x() * Expr::param("R") + Expr::num(2.0);
        assert_eq!(Poly::from_expr(&e).as_constant(), Some(2.0));
    }

    #[test]
    fn test_isolate_linear() {
        // R*x - 2*y = 0  =>  x = 2*y/R
        let r = Expr::param("R") * x() - Expr::num(2.0) * Expr::func("y");
        let value = Poly::from_expr(&r).isolate(&x()).unwrap();
        let at = value.to_expr().eval(0.0, &|e, _| match e {
            Expr::Param(_) => Some(4.0),
            Expr::Func { .. } => Some(3.0),
            _ => None,
        });
        assert_relative_eq!(at.unwrap(), 1.5);
    }

    #[test]
    fn test_isolate_rejects_nonlinear_and_derivatives() {
        let squared = Poly::from_expr(&(x() * x() - Expr::one()));
        assert!(squared.isolate(&x()).is_none());

        let with_derivative = Poly::from_expr(&(x() + Expr::derivative("x", 1)));
        assert!(with_derivative.isolate(&x()).is_none());

        let with_integral = Poly::from_expr(&(x() + Expr::integral(x())));
        assert!(with_integral.isolate(&x()).is_none());
    }

    #[test]
    fn test_isolate_with_sum_coefficient() {
        // (R1 + R2) * i - V = 0
        let e = (Expr::param("R1") + Expr::param("R2")) * Expr::func("i") - Expr::param("V");
        let value = Poly::from_expr(&e).isolate(&Expr::func("i")).unwrap();
        let got = value.to_expr().eval(0.0, &|e, _| match e {
            Expr::Param(s) if s.name() == "R1" => Some(1.0),
            Expr::Param(s) if s.name() == "R2" => Some(3.0),
            Expr::Param(_) => Some(8.0),
            _ => None,
        });
        assert_relative_eq!(got.unwrap(), 2.0);
    }

    #[test]
    fn test_reciprocal_round_trip() {
        let s = Poly::from_expr(&(Expr::param("a") + Expr::num(2.0)));
        let product = s.mul(&s.reciprocal());
        // (a + 2) * 1/(a + 2) stays opaque but must evaluate to one
        let v = product
            .to_expr()
            .eval(0.0, &|_, _| Some(5.0))
            .unwrap();
        assert_relative_eq!(v, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_integral_of_polynomial_in_time() {
        let e = Expr::integral(Expr::num(3.0) * Expr::time() * Expr::time() + Expr::param("k"));
        let p = Poly::from_expr(&e);
        // t^3 + k*t
        assert!(!p.to_expr().has_integral());
        let v = p.to_expr().eval(2.0, &|_, _| Some(0.5)).unwrap();
        assert_relative_eq!(v, 9.0);
    }

    #[test]
    fn test_solve_linear_chain() {
        // a + b = 3, a - b = 1
        let a = Expr::initial("a", 0);
        let b = Expr::initial("b", 0);
        let eqs = vec![
            Poly::from_expr(&(a.clone() + b.clone() - Expr::num(3.0))),
            Poly::from_expr(&(a.clone() - b.clone() - Expr::num(1.0))),
        ];
        let solution = solve_linear(eqs, &[a.clone(), b.clone()]);
        assert_eq!(solution.get(&a).and_then(Poly::as_constant), Some(2.0));
        assert_eq!(solution.get(&b).and_then(Poly::as_constant), Some(1.0));
        assert!(solution.leftover.is_empty());
    }

    #[test]
    fn test_reciprocal_base_is_stable() {
        // c * (1/c) rounds below one for this value
        let c = 0.8001939952975388;
        let e = Expr::num(c) / (Expr::param("p") + Expr::num(c));
        let once = e.normalize();
        assert_eq!(once.normalize(), once);
        let residual = Poly::from_expr(&once).sub(&Poly::from_expr(&e));
        assert!(residual.is_zero(), "{:?}", residual);
    }

    proptest! {
        #[test]
        fn prop_normalisation_is_idempotent(a in -50.0f64..50.0, b in -50.0f64..50.0, c in 0.1f64..10.0) {
            let e = Expr::num(a) * x() + Expr::num(b) * Expr::param("p") * Expr::time()
                + Expr::num(c) / (Expr::param("p") + Expr::num(c));
            let once = e.normalize();
            prop_assert_eq!(once.normalize(), once);
        }

        #[test]
        fn prop_normal_form_preserves_value(a in -5.0f64..5.0, b in -5.0f64..5.0, t in 0.0f64..2.0) {
            let e = (Expr::num(a) + Expr::time()) * (Expr::num(b) - Expr::time()) + Expr::exp(Expr::num(a) * Expr::time());
            let direct = e.eval_at(t).unwrap();
            let normal = e.normalize().eval_at(t).unwrap();
            prop_assert!((direct - normal).abs() <= 1e-9 * direct.abs().max(1.0));
        }
    }
}
