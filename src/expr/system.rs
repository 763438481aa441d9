//! Equations and insertion-ordered equation systems.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::{Expr, Poly, Symbol};
use crate::error::{Result, SymcircError};

/// `lhs = rhs`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Equation {
    pub lhs: Expr,
    pub rhs: Expr,
}

impl Equation {
    pub fn new(lhs: Expr, rhs: Expr) -> Self {
        Self { lhs, rhs }
    }

    /// `lhs - rhs` in canonical form.
    pub fn residual(&self) -> Poly {
        Poly::from_expr(&self.lhs).sub(&Poly::from_expr(&self.rhs))
    }

    /// True if the equation holds for any values of its symbols.
    pub fn is_identity(&self) -> bool {
        self.residual().is_zero()
    }

    /// The non-zero constant the equation reduces to, if it can never hold.
    pub fn conflict(&self) -> Option<f64> {
        self.residual().as_constant().filter(|c| *c != 0.0)
    }

    pub fn map(&self, mut f: impl FnMut(&Expr) -> Expr) -> Equation {
        Equation::new(f(&self.lhs), f(&self.rhs))
    }

    pub fn substitute(&self, sym: &Symbol, replacement: &Expr) -> Equation {
        self.map(|e| e.substitute(sym, replacement))
    }

    pub fn substitute_all(&self, bindings: &BTreeMap<Symbol, Expr>) -> Equation {
        self.map(|e| e.substitute_all(bindings))
    }

    pub fn differentiate(&self) -> Equation {
        self.map(Expr::differentiate)
    }

    pub fn at_zero(&self) -> Equation {
        self.map(Expr::at_zero)
    }

    pub fn functions(&self) -> BTreeSet<Symbol> {
        let mut out = self.lhs.functions();
        out.extend(self.rhs.functions());
        out
    }

    pub fn params(&self) -> BTreeSet<Symbol> {
        let mut out = self.lhs.params();
        out.extend(self.rhs.params());
        out
    }

    /// Rearrange into `target = value`.
    pub fn solve_for(&self, target: &Expr) -> Option<Expr> {
        self.residual().isolate(target).map(|p| p.to_expr())
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.lhs, self.rhs)
    }
}

/// A set of equations keyed by left-hand side, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct System {
    equations: Vec<Equation>,
}

impl System {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.equations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Equation> {
        self.equations.iter()
    }

    fn position(&self, lhs: &Expr) -> Option<usize> {
        self.equations.iter().position(|eq| &eq.lhs == lhs)
    }

    /// Right-hand side stored under `lhs`.
    pub fn get(&self, lhs: &Expr) -> Option<&Expr> {
        self.position(lhs).map(|i| &self.equations[i].rhs)
    }

    /// Add an equation, replacing any with the same left-hand side.
    pub fn insert(mut self, eq: Equation) -> Self {
        match self.position(&eq.lhs) {
            Some(i) => self.equations[i] = eq,
            None => self.equations.push(eq),
        }
        self
    }

    /// Add an equation without losing information.
    ///
    /// When the left-hand side is already present, both right-hand sides
    /// must agree: an equivalent equation is dropped, a pair whose
    /// difference is a non-zero constant is a contradiction, and anything
    /// else is kept as `old rhs = new rhs`, which may collide in turn. A
    /// chain of such joins that returns to a left-hand side it already
    /// visited is stored in residual form `lhs - rhs = 0` instead.
    pub fn try_insert(&mut self, eq: Equation) -> Result<()> {
        let mut eq = eq;
        let mut visited: Vec<Expr> = Vec::new();
        let mut residual_form = false;
        loop {
            if eq.is_identity() {
                return Ok(());
            }
            if let Some(c) = eq.conflict() {
                tracing::debug!(equation = %eq, residual = c, "equation can never hold");
                return Err(SymcircError::contradiction(&eq, "0 = 0"));
            }
            if visited.contains(&eq.lhs) {
                if residual_form {
                    return Err(SymcircError::CyclicEquations {
                        equation: eq.to_string(),
                    });
                }
                tracing::debug!(equation = %eq, "join chain is cyclic, keeping residual form");
                residual_form = true;
                eq = Equation::new(eq.residual().to_expr(), Expr::zero());
                continue;
            }
            let Some(i) = self.position(&eq.lhs) else {
                self.equations.push(eq);
                return Ok(());
            };
            let existing = &self.equations[i];
            let joined = Equation::new(existing.rhs.clone(), eq.rhs.clone());
            if joined.is_identity() {
                return Ok(());
            }
            if joined.conflict().is_some() {
                return Err(SymcircError::contradiction(existing, &eq));
            }
            visited.push(eq.lhs.clone());
            eq = joined;
        }
    }

    /// Add an equation; on a left-hand side collision the new equation is
    /// kept in residual form `lhs - rhs = 0` instead.
    pub fn merge(mut self, eq: Equation) -> Self {
        match self.get(&eq.lhs).cloned() {
            None => self.equations.push(eq),
            Some(rhs) if Equation::new(rhs.clone(), eq.rhs.clone()).is_identity() => {}
            Some(_) => {
                let residual = Equation::new(eq.lhs.clone() - eq.rhs.clone(), Expr::zero());
                if !residual.is_identity() {
                    self = self.insert(Equation::new(residual.residual().to_expr(), Expr::zero()));
                }
            }
        }
        self
    }

    /// The system without the equation at `index`.
    pub fn without(&self, index: usize) -> Self {
        let mut equations = self.equations.clone();
        if index < equations.len() {
            equations.remove(index);
        }
        Self { equations }
    }

    pub fn substitute(&self, sym: &Symbol, replacement: &Expr) -> Self {
        self.iter()
            .map(|eq| eq.substitute(sym, replacement))
            .fold(System::new(), System::merge)
    }

    pub fn substitute_all(&self, bindings: &BTreeMap<Symbol, Expr>) -> Self {
        self.iter()
            .map(|eq| eq.substitute_all(bindings))
            .fold(System::new(), System::merge)
    }

    pub fn functions(&self) -> BTreeSet<Symbol> {
        self.iter().flat_map(Equation::functions).collect()
    }

    pub fn params(&self) -> BTreeSet<Symbol> {
        self.iter().flat_map(Equation::params).collect()
    }
}

impl<'a> IntoIterator for &'a System {
    type Item = &'a Equation;
    type IntoIter = std::slice::Iter<'a, Equation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for eq in &self.equations {
            writeln!(f, "{}", eq)?;
        }
        Ok(())
    }
}
