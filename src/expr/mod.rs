//! Symbolic expressions over a single time variable.
//!
//! An [`Expr`] is an immutable tree built from constants, the time variable
//! `t`, free parameters, unknown functions of time (and their derivatives),
//! the values of those functions at `t = 0`, definite integrals over `[0, t]`,
//! a handful of elementary functions, sums, products and integer powers.
//!
//! Every rewrite ([`Expr::substitute`], [`Expr::differentiate`],
//! [`Expr::at_zero`]) returns a new tree. Rebuilding goes through the smart
//! constructors ([`Expr::sum`], [`Expr::product`], [`Expr::pow`]) which fold
//! constants and flatten nested sums and products but do nothing else.
//! Anything stronger (collecting like terms, cancelling, isolating an
//! unknown) goes through the canonical form in [`Poly`].

mod poly;
mod system;

pub use poly::{solve_linear, LinearSolution, Monomial, Poly};
pub use system::{Equation, System};

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use crate::error::{Result, SymcircError};

/// Number of Simpson panels used to evaluate an integral numerically.
const QUADRATURE_PANELS: usize = 64;

/// A uniquely named atomic reference.
///
/// The same name always denotes the same thing: a node potential, a branch
/// current or a free parameter.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Create a symbol from its name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The symbol's name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&Symbol> for Symbol {
    fn from(symbol: &Symbol) -> Self {
        symbol.clone()
    }
}

/// A numeric constant with a total order, so expressions can key ordered maps.
#[derive(Debug, Clone, Copy)]
pub struct Scalar(f64);

impl Scalar {
    /// Wrap a value, folding `-0.0` into `0.0`.
    pub fn new(value: f64) -> Self {
        Self(if value == 0.0 { 0.0 } else { value })
    }

    /// The wrapped value.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Elementary functions that may appear in closed-form solutions and sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Elementary {
    Exp,
    Sin,
    Cos,
}

impl Elementary {
    /// Evaluate the function at a number.
    pub fn eval(self, x: f64) -> f64 {
        match self {
            Elementary::Exp => x.exp(),
            Elementary::Sin => x.sin(),
            Elementary::Cos => x.cos(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Elementary::Exp => "exp",
            Elementary::Sin => "sin",
            Elementary::Cos => "cos",
        }
    }
}

/// A symbolic expression in the time variable `t`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Expr {
    /// Numeric constant
    Num(Scalar),
    /// The time variable
    Time,
    /// Free parameter, constant in time
    Param(Symbol),
    /// `order`-th time derivative of an unknown function
    Func { sym: Symbol, order: u32 },
    /// `order`-th time derivative of an unknown function, evaluated at `t = 0`
    Initial { sym: Symbol, order: u32 },
    /// Definite integral of the inner expression over `[0, t]`
    Integral(Box<Expr>),
    /// Elementary function application
    Apply(Elementary, Box<Expr>),
    Sum(Vec<Expr>),
    Product(Vec<Expr>),
    /// Integer power
    Pow(Box<Expr>, i32),
}

impl Expr {
    // ============ Constructors ============

    pub fn num(value: f64) -> Self {
        Expr::Num(Scalar::new(value))
    }

    pub fn zero() -> Self {
        Expr::num(0.0)
    }

    pub fn one() -> Self {
        Expr::num(1.0)
    }

    pub fn time() -> Self {
        Expr::Time
    }

    pub fn param(name: impl Into<Symbol>) -> Self {
        Expr::Param(name.into())
    }

    /// An unknown function of time, `name(t)`.
    pub fn func(name: impl Into<Symbol>) -> Self {
        Expr::Func {
            sym: name.into(),
            order: 0,
        }
    }

    /// The `order`-th derivative of an unknown function.
    pub fn derivative(name: impl Into<Symbol>, order: u32) -> Self {
        Expr::Func {
            sym: name.into(),
            order,
        }
    }

    /// The `order`-th derivative of an unknown function at `t = 0`.
    pub fn initial(name: impl Into<Symbol>, order: u32) -> Self {
        Expr::Initial {
            sym: name.into(),
            order,
        }
    }

    /// `∫₀ᵗ inner dt'`.
    pub fn integral(inner: Expr) -> Self {
        if inner.is_zero() {
            Expr::zero()
        } else {
            Expr::Integral(Box::new(inner))
        }
    }

    pub fn apply(function: Elementary, arg: Expr) -> Self {
        match arg.as_num() {
            Some(x) => Expr::num(function.eval(x)),
            None => Expr::Apply(function, Box::new(arg)),
        }
    }

    pub fn exp(arg: Expr) -> Self {
        Expr::apply(Elementary::Exp, arg)
    }

    pub fn sin(arg: Expr) -> Self {
        Expr::apply(Elementary::Sin, arg)
    }

    pub fn cos(arg: Expr) -> Self {
        Expr::apply(Elementary::Cos, arg)
    }

    /// Sum with nested sums flattened and constants folded into one term.
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Self {
        fn flatten(term: Expr, constant: &mut f64, out: &mut Vec<Expr>) {
            match term {
                Expr::Num(c) => *constant += c.value(),
                Expr::Sum(inner) => {
                    for t in inner {
                        flatten(t, constant, out);
                    }
                }
                other => out.push(other),
            }
        }

        let mut constant = 0.0;
        let mut out = Vec::new();
        for term in terms {
            flatten(term, &mut constant, &mut out);
        }
        if constant != 0.0 || constant.is_nan() {
            out.push(Expr::num(constant));
        }
        match out.len() {
            0 => Expr::zero(),
            1 => out.pop().unwrap_or_else(Expr::zero),
            _ => Expr::Sum(out),
        }
    }

    /// Product with nested products flattened and constants folded into a
    /// leading coefficient.
    pub fn product(factors: impl IntoIterator<Item = Expr>) -> Self {
        fn flatten(factor: Expr, constant: &mut f64, out: &mut Vec<Expr>) {
            match factor {
                Expr::Num(c) => *constant *= c.value(),
                Expr::Product(inner) => {
                    for f in inner {
                        flatten(f, constant, out);
                    }
                }
                other => out.push(other),
            }
        }

        let mut constant = 1.0;
        let mut out = Vec::new();
        for factor in factors {
            flatten(factor, &mut constant, &mut out);
        }
        if constant == 0.0 {
            return Expr::zero();
        }
        if out.is_empty() {
            return Expr::num(constant);
        }
        if constant != 1.0 {
            out.insert(0, Expr::num(constant));
        }
        if out.len() == 1 {
            out.pop().unwrap_or_else(Expr::one)
        } else {
            Expr::Product(out)
        }
    }

    pub fn pow(base: Expr, exponent: i32) -> Self {
        match (base, exponent) {
            (_, 0) => Expr::one(),
            (base, 1) => base,
            (Expr::Num(c), n) => Expr::num(c.value().powi(n)),
            (Expr::Pow(inner, m), n) => Expr::pow(*inner, m * n),
            (base, n) => Expr::Pow(Box::new(base), n),
        }
    }

    // ============ Queries ============

    /// The numeric value, if this is a constant.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Expr::Num(c) => Some(c.value()),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_num() == Some(0.0)
    }

    /// Visit every node of the tree, parents before children.
    pub fn visit(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Integral(inner) | Expr::Apply(_, inner) | Expr::Pow(inner, _) => inner.visit(f),
            Expr::Sum(items) | Expr::Product(items) => {
                for item in items {
                    item.visit(f);
                }
            }
            Expr::Num(_) | Expr::Time | Expr::Param(_) | Expr::Func { .. } | Expr::Initial { .. } => {}
        }
    }

    /// Unknown functions referenced anywhere in the tree, at any derivative order.
    pub fn functions(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.visit(&mut |e| {
            if let Expr::Func { sym, .. } = e {
                out.insert(sym.clone());
            }
        });
        out
    }

    /// Free parameters referenced anywhere in the tree.
    pub fn params(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.visit(&mut |e| {
            if let Expr::Param(sym) = e {
                out.insert(sym.clone());
            }
        });
        out
    }

    pub fn has_integral(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| found |= matches!(e, Expr::Integral(_)));
        found
    }

    /// Highest derivative order of `sym` in the tree.
    pub fn max_order(&self, sym: &Symbol) -> Option<u32> {
        let mut order = None;
        self.visit(&mut |e| {
            if let Expr::Func { sym: s, order: o } = e {
                if s == sym {
                    order = Some(order.map_or(*o, |cur: u32| cur.max(*o)));
                }
            }
        });
        order
    }

    /// True if the value of the tree changes with `t`.
    pub fn depends_on_time(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| found |= matches!(e, Expr::Time | Expr::Func { .. } | Expr::Integral(_)));
        found
    }

    /// True if the tree refers to `target`.
    ///
    /// For an unknown function this means any derivative of it, including
    /// occurrences under an integral; values at `t = 0` do not count.
    pub fn mentions(&self, target: &Expr) -> bool {
        let mut found = false;
        match target {
            Expr::Func { sym, .. } => self.visit(&mut |e| {
                found |= matches!(e, Expr::Func { sym: s, .. } if s == sym);
            }),
            _ => self.visit(&mut |e| found |= e == target),
        }
        found
    }

    // ============ Rewrites ============

    /// Rebuild the tree bottom-up, replacing every node for which `f`
    /// returns a value.
    pub fn map(&self, f: &mut dyn FnMut(&Expr) -> Option<Expr>) -> Expr {
        if let Some(replaced) = f(self) {
            return replaced;
        }
        match self {
            Expr::Num(_) | Expr::Time | Expr::Param(_) | Expr::Func { .. } | Expr::Initial { .. } => self.clone(),
            Expr::Integral(inner) => Expr::integral(inner.map(f)),
            Expr::Apply(function, inner) => Expr::apply(*function, inner.map(f)),
            Expr::Pow(base, n) => Expr::pow(base.map(f), *n),
            Expr::Sum(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.map(&mut *f));
                }
                Expr::sum(out)
            }
            Expr::Product(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.map(&mut *f));
                }
                Expr::product(out)
            }
        }
    }

    /// Replace every occurrence of `sym` by `replacement`.
    ///
    /// A parameter is replaced directly; the k-th derivative of an unknown
    /// function is replaced by the k-th derivative of `replacement`, and its
    /// value at `t = 0` by that derivative evaluated at `t = 0`.
    pub fn substitute(&self, sym: &Symbol, replacement: &Expr) -> Expr {
        let mut derivatives = vec![replacement.clone()];
        let nth = |n: u32, derivatives: &mut Vec<Expr>| {
            while derivatives.len() <= n as usize {
                let next = derivatives[derivatives.len() - 1].differentiate();
                derivatives.push(next);
            }
            derivatives[n as usize].clone()
        };
        self.map(&mut |e| match e {
            Expr::Param(s) if s == sym => Some(replacement.clone()),
            Expr::Func { sym: s, order } if s == sym => Some(nth(*order, &mut derivatives)),
            Expr::Initial { sym: s, order } if s == sym => Some(nth(*order, &mut derivatives).at_zero()),
            _ => None,
        })
    }

    /// Substitute several symbols in a single pass.
    pub fn substitute_all(&self, bindings: &BTreeMap<Symbol, Expr>) -> Expr {
        if bindings.is_empty() {
            return self.clone();
        }
        self.map(&mut |e| match e {
            Expr::Param(s) => bindings.get(s).cloned(),
            Expr::Func { sym, order } => bindings.get(sym).map(|r| r.differentiate_n(*order)),
            Expr::Initial { sym, order } => bindings.get(sym).map(|r| r.differentiate_n(*order).at_zero()),
            _ => None,
        })
    }

    /// Replace an atom: unknown functions and parameters go through
    /// [`Expr::substitute`], anything else is replaced as an exact subtree.
    pub fn substitute_atom(&self, target: &Expr, replacement: &Expr) -> Expr {
        match target {
            Expr::Func { sym, order: 0 } | Expr::Param(sym) => self.substitute(sym, replacement),
            _ => self.map(&mut |e| (e == target).then(|| replacement.clone())),
        }
    }

    /// Time derivative.
    pub fn differentiate(&self) -> Expr {
        match self {
            Expr::Num(_) | Expr::Param(_) | Expr::Initial { .. } => Expr::zero(),
            Expr::Time => Expr::one(),
            Expr::Func { sym, order } => Expr::Func {
                sym: sym.clone(),
                order: order + 1,
            },
            // d/dt ∫₀ᵗ g = g(t)
            Expr::Integral(inner) => (**inner).clone(),
            Expr::Apply(function, inner) => {
                let outer = match function {
                    Elementary::Exp => self.clone(),
                    Elementary::Sin => Expr::cos((**inner).clone()),
                    Elementary::Cos => -Expr::sin((**inner).clone()),
                };
                outer * inner.differentiate()
            }
            Expr::Sum(items) => Expr::sum(items.iter().map(Expr::differentiate)),
            Expr::Product(items) => Expr::sum((0..items.len()).map(|i| {
                Expr::product(items.iter().enumerate().map(|(j, f)| {
                    if i == j {
                        f.differentiate()
                    } else {
                        f.clone()
                    }
                }))
            })),
            Expr::Pow(base, n) => Expr::product([
                Expr::num(*n as f64),
                Expr::pow((**base).clone(), n - 1),
                base.differentiate(),
            ]),
        }
    }

    pub fn differentiate_n(&self, n: u32) -> Expr {
        (0..n).fold(self.clone(), |acc, _| acc.differentiate())
    }

    /// Evaluate at `t = 0`: integrals vanish and unknown functions become
    /// their initial values.
    pub fn at_zero(&self) -> Expr {
        self.map(&mut |e| match e {
            Expr::Time | Expr::Integral(_) => Some(Expr::zero()),
            Expr::Func { sym, order } => Some(Expr::Initial {
                sym: sym.clone(),
                order: *order,
            }),
            _ => None,
        })
    }

    /// Canonical form of the expression (see [`Poly`]).
    pub fn normalize(&self) -> Expr {
        Poly::from_expr(self).to_expr()
    }

    // ============ Evaluation ============

    /// Evaluate numerically at time `t`.
    ///
    /// `lookup` is asked for the value of every parameter, unknown function
    /// and initial value at the given time.
    pub fn eval(&self, t: f64, lookup: &dyn Fn(&Expr, f64) -> Option<f64>) -> Result<f64> {
        match self {
            Expr::Num(c) => Ok(c.value()),
            Expr::Time => Ok(t),
            Expr::Param(sym) => lookup(self, t).ok_or_else(|| SymcircError::UnboundParameter {
                symbol: sym.to_string(),
            }),
            Expr::Func { sym, .. } | Expr::Initial { sym, .. } => {
                lookup(self, t).ok_or_else(|| SymcircError::UnresolvedFunction {
                    symbol: sym.to_string(),
                })
            }
            Expr::Integral(inner) => simpson(inner, t, lookup),
            Expr::Apply(function, inner) => Ok(function.eval(inner.eval(t, lookup)?)),
            Expr::Sum(items) => items.iter().try_fold(0.0, |acc, e| Ok(acc + e.eval(t, lookup)?)),
            Expr::Product(items) => items.iter().try_fold(1.0, |acc, e| Ok(acc * e.eval(t, lookup)?)),
            Expr::Pow(base, n) => Ok(base.eval(t, lookup)?.powi(*n)),
        }
    }

    /// Evaluate an expression that only depends on `t`.
    pub fn eval_at(&self, t: f64) -> Result<f64> {
        self.eval(t, &|_, _| None)
    }

    /// Evaluate with parameters taken from `values`.
    pub fn eval_with(&self, t: f64, values: &BTreeMap<Symbol, f64>) -> Result<f64> {
        self.eval(t, &|e, _| match e {
            Expr::Param(sym) => values.get(sym).copied(),
            _ => None,
        })
    }

    /// Split off a negative leading coefficient, for printing.
    fn split_sign(&self) -> Option<Expr> {
        match self {
            Expr::Num(c) if c.value() < 0.0 => Some(Expr::num(-c.value())),
            Expr::Product(items) => match items.first().and_then(Expr::as_num) {
                Some(c) if c < 0.0 => Some(Expr::product(
                    std::iter::once(Expr::num(-c)).chain(items[1..].iter().cloned()),
                )),
                _ => None,
            },
            _ => None,
        }
    }

    fn is_compound(&self) -> bool {
        matches!(self, Expr::Sum(_) | Expr::Product(_) | Expr::Pow(..))
            || matches!(self, Expr::Num(c) if c.value() < 0.0)
    }
}

/// Composite Simpson rule over `[0, t]`.
fn simpson(inner: &Expr, t: f64, lookup: &dyn Fn(&Expr, f64) -> Option<f64>) -> Result<f64> {
    if t == 0.0 {
        return Ok(0.0);
    }
    let h = t / QUADRATURE_PANELS as f64;
    let mut total = inner.eval(0.0, lookup)? + inner.eval(t, lookup)?;
    for i in 1..QUADRATURE_PANELS {
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        total += weight * inner.eval(i as f64 * h, lookup)?;
    }
    Ok(total * h / 3.0)
}

fn primes(order: u32) -> String {
    match order {
        0 => String::new(),
        1 => "'".to_string(),
        2 => "''".to_string(),
        n => format!("^({})", n),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(c) => write!(f, "{}", c.value()),
            Expr::Time => write!(f, "t"),
            Expr::Param(sym) => write!(f, "{}", sym),
            Expr::Func { sym, order } => write!(f, "{}{}(t)", sym, primes(*order)),
            Expr::Initial { sym, order } => write!(f, "{}{}(0)", sym, primes(*order)),
            Expr::Integral(inner) => write!(f, "∫[0,t]({})", inner),
            Expr::Apply(function, inner) => write!(f, "{}({})", function.name(), inner),
            Expr::Sum(items) => {
                for (i, item) in items.iter().enumerate() {
                    match (i, item.split_sign()) {
                        (0, Some(positive)) => write!(f, "-{}", positive)?,
                        (0, None) => write!(f, "{}", item)?,
                        (_, Some(positive)) => write!(f, " - {}", positive)?,
                        (_, None) => write!(f, " + {}", item)?,
                    }
                }
                Ok(())
            }
            Expr::Product(items) => {
                let mut rest = &items[..];
                if items.first().and_then(Expr::as_num) == Some(-1.0) {
                    write!(f, "-")?;
                    rest = &items[1..];
                }
                for (i, item) in rest.iter().enumerate() {
                    if i > 0 {
                        write!(f, "*")?;
                    }
                    if matches!(item, Expr::Sum(_)) || (i > 0 && item.is_compound()) {
                        write!(f, "({})", item)?;
                    } else {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            Expr::Pow(base, n) => {
                if base.is_compound() {
                    write!(f, "({})^{}", base, n)
                } else {
                    write!(f, "{}^{}", base, n)
                }
            }
        }
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::num(value)
    }
}

impl From<Symbol> for Expr {
    fn from(sym: Symbol) -> Self {
        Expr::Param(sym)
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::sum([self, rhs])
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        Expr::sum([self, -rhs])
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::product([self, rhs])
    }
}

impl Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        Expr::product([self, Expr::pow(rhs, -1)])
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::product([Expr::num(-1.0), self])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant_folding() {
        let x = Expr::func("x");
        assert_eq!(x.clone() + Expr::zero(), x);
        assert_eq!(x.clone() * Expr::one(), x);
        assert_eq!(x.clone() * Expr::zero(), Expr::zero());
        assert_eq!(Expr::num(2.0) * Expr::num(3.0), Expr::num(6.0));
        assert_eq!(Expr::pow(Expr::pow(x.clone(), 2), 3), Expr::Pow(Box::new(x), 6));
    }

    #[test]
    fn test_flattening() {
        let (a, b, c) = (Expr::param("a"), Expr::param("b"), Expr::param("c"));
        let nested = (a.clone() + b.clone()) + (c.clone() + Expr::num(1.0)) + Expr::num(2.0);
        assert_eq!(nested, Expr::Sum(vec![a, b, c, Expr::num(3.0)]));
    }

    #[test]
    fn test_substitute_replaces_derivatives_and_initial_values() {
        let e = Expr::derivative("x", 1) + Expr::initial("x", 0);
        let replaced = e.substitute(&Symbol::new("x"), &(Expr::num(3.0) * Expr::time()));
        // d/dt 3t = 3 and 3t at 0 = 0
        assert_eq!(replaced.normalize(), Expr::num(3.0));
    }

    #[test]
    fn test_substitute_inside_integral() {
        let e = Expr::integral(Expr::func("i"));
        let replaced = e.substitute(&Symbol::new("i"), &Expr::num(2.0));
        assert_relative_eq!(replaced.eval_at(1.5).unwrap(), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fundamental_theorem() {
        let g = Expr::param("k") * Expr::func("i");
        assert_eq!(Expr::integral(g.clone()).differentiate(), g);
    }

    #[test]
    fn test_differentiate_product_and_exp() {
        let t = Expr::time();
        let e = t.clone() * Expr::exp(Expr::num(-2.0) * t.clone());
        let d = e.differentiate();
        let expected = |t: f64| (-2.0 * t).exp() * (1.0 - 2.0 * t);
        assert_relative_eq!(d.eval_at(0.3).unwrap(), expected(0.3), epsilon = 1e-12);
    }

    #[test]
    fn test_at_zero() {
        let e = Expr::func("x") + Expr::integral(Expr::func("y")) + Expr::time();
        assert_eq!(e.at_zero(), Expr::initial("x", 0));
    }

    #[test]
    fn test_unbound_parameter() {
        let e = Expr::param("R") * Expr::time();
        assert!(matches!(e.eval_at(1.0), Err(SymcircError::UnboundParameter { .. })));

        let mut values = BTreeMap::new();
        values.insert(Symbol::new("R"), 4.0);
        assert_relative_eq!(e.eval_with(0.5, &values).unwrap(), 2.0);
    }

    #[test]
    fn test_mentions() {
        let e = Expr::integral(Expr::derivative("x", 1)) + Expr::initial("y", 0);
        assert!(e.mentions(&Expr::func("x")));
        assert!(!e.mentions(&Expr::func("y")));
        assert!(e.mentions(&Expr::initial("y", 0)));
    }

    #[test]
    fn test_display() {
        let e = Expr::param("C") * Expr::func("u") - Expr::integral(Expr::derivative("i", 1));
        assert_eq!(e.to_string(), "C*u(t) - ∫[0,t](i'(t))");
    }
}
