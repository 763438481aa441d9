//! Reduction of the differential system to one equation per unknown.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::expr::{Equation, Expr, Poly, Symbol, System};

/// Outcome of [`decouple`].
#[derive(Debug, Clone, Default)]
pub struct Decoupling {
    /// One equation per unknown, mentioning no other unknown
    pub equations: BTreeMap<Symbol, Equation>,
    /// Unknowns with no equation of their own that can be written directly
    /// in terms of other unknowns
    pub dependent: BTreeMap<Symbol, Expr>,
    /// Unknowns for which neither could be found
    pub underdetermined: Vec<Symbol>,
}

impl Decoupling {
    /// Number of unknowns that got an equation of their own.
    pub fn len(&self) -> usize {
        self.equations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }
}

/// Derive, for every unknown, an equation that mentions no other unknown.
///
/// For each target the other unknowns are eliminated one by one: each is
/// isolated from the first equation that allows it and substituted into the
/// rest. The first resulting equation whose only unknown is the target is
/// kept. Never fails; unknowns that cannot be isolated are reported.
pub fn decouple(system: &System, unknowns: &[Symbol]) -> Decoupling {
    let mut out = Decoupling::default();
    let mut failed = Vec::new();

    for target in unknowns {
        match eliminate_others(system, target, unknowns) {
            Some(eq) => {
                debug!(symbol = %target, equation = %eq, "decoupled");
                out.equations.insert(target.clone(), eq);
            }
            None => failed.push(target.clone()),
        }
    }

    for target in failed {
        let atom = Expr::func(target.clone());
        let value = system
            .iter()
            .filter_map(|eq| eq.residual().isolate(&atom))
            .map(|p| p.to_expr())
            .find(|v| !v.mentions(&atom));
        match value {
            Some(value) => {
                debug!(symbol = %target, value = %value, "expressed through other unknowns");
                out.dependent.insert(target, value);
            }
            None => {
                warn!(symbol = %target, "no equation isolates this unknown");
                out.underdetermined.push(target);
            }
        }
    }

    out
}

fn eliminate_others(system: &System, target: &Symbol, unknowns: &[Symbol]) -> Option<Equation> {
    let mut residuals: Vec<Poly> = system
        .iter()
        .map(Equation::residual)
        .filter(|r| !r.is_zero())
        .collect();
    let mut remaining: Vec<&Symbol> = unknowns.iter().filter(|u| *u != target).collect();

    loop {
        let before = remaining.len();
        remaining.retain(|other| {
            let atom = Expr::func((*other).clone());
            let found = residuals
                .iter()
                .enumerate()
                .find_map(|(i, r)| r.isolate(&atom).map(|v| (i, v)));
            let Some((index, value)) = found else {
                return true;
            };
            residuals.remove(index);
            let replacement = value.to_expr();
            for r in residuals.iter_mut() {
                *r = r.substitute_atom(&atom, &replacement);
            }
            residuals.retain(|r| !r.is_zero());
            false
        });
        if remaining.len() == before || remaining.is_empty() {
            break;
        }
    }

    let only_target = BTreeSet::from([target.clone()]);
    residuals
        .into_iter()
        .map(|r| r.to_expr())
        .find(|e| e.functions() == only_target)
        .map(|e| Equation::new(e, Expr::zero()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(name: &str) -> Expr {
        Expr::func(name)
    }

    /// Ideal LC loop: C*u = ∫ i, L*i = -∫ u.
    fn lc() -> (System, Vec<Symbol>) {
        let system = System::new()
            .insert(Equation::new(Expr::param("C") * f("u"), Expr::integral(f("i"))))
            .insert(Equation::new(
                Expr::param("L") * f("i"),
                -Expr::integral(f("u")),
            ));
        (system, vec![Symbol::new("i"), Symbol::new("u")])
    }

    #[test]
    fn test_lc_decouples_current() {
        let (system, unknowns) = lc();
        let d = decouple(&system, &unknowns);
        let eq = &d.equations[&Symbol::new("i")];
        assert_eq!(eq.functions(), BTreeSet::from([Symbol::new("i")]));
        assert!(eq.lhs.has_integral());
    }

    #[test]
    fn test_lc_decouples_both_unknowns() {
        let (system, unknowns) = lc();
        let d = decouple(&system, &unknowns);
        assert_eq!(d.len(), 2);
        assert!(d.dependent.is_empty());
        assert!(d.underdetermined.is_empty());
    }

    #[test]
    fn test_dependent_unknown() {
        // C*u = ∫ i and ∫ i = t: i never appears outside an integral
        let system = System::new()
            .insert(Equation::new(Expr::param("C") * f("u"), Expr::integral(f("i"))))
            .insert(Equation::new(Expr::integral(f("i")), Expr::time()));
        let unknowns = vec![Symbol::new("i"), Symbol::new("u")];
        let d = decouple(&system, &unknowns);
        assert!(d.equations.contains_key(&Symbol::new("i")));
        let value = &d.dependent[&Symbol::new("u")];
        assert_eq!(value.functions(), BTreeSet::from([Symbol::new("i")]));
    }

    #[test]
    fn test_underdetermined_is_reported() {
        let system = System::new().insert(Equation::new(f("a") * f("a"), f("b") * f("b")));
        let unknowns = vec![Symbol::new("a"), Symbol::new("b")];
        let d = decouple(&system, &unknowns);
        assert!(d.is_empty());
        assert_eq!(d.underdetermined, unknowns);
    }
}
