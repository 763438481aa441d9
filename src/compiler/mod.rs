//! Equation compiler.
//!
//! Turns a list of components into per-unknown differential equations:
//!
//! 1. collect the unknowns and the three equation sets
//! 2. eliminate what the algebraic (invariant) equations determine
//! 3. substitute those values into the integral-form equations
//! 4. decouple the integral-form equations, one per remaining unknown
//! 5. differentiate each into an ODE and find its initial values

mod decouple;
mod initial;
mod simplify;

pub use decouple::{decouple, Decoupling};
pub use initial::{initial_conditions, DerivedEquation};
pub use simplify::{simplify, Simplification};

use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};

use crate::circuit::{node_currents, validate_components};
use crate::components::Component;
use crate::error::Result;
use crate::expr::{Equation, Expr, Symbol, System};

/// Compiled equations of a circuit.
#[derive(Debug, Clone)]
pub struct Compiler {
    variables: Vec<Symbol>,
    invariant: System,
    differential: System,
    variant: System,
    simplification: Simplification,
    reduced: System,
    decoupling: Decoupling,
    derived: BTreeMap<Symbol, DerivedEquation>,
    underdetermined: Vec<Symbol>,
    parameters: BTreeSet<Symbol>,
}

impl Compiler {
    /// Compile the equations of a component list.
    pub fn new(components: &[Component]) -> Result<Self> {
        validate_components(components)?;
        info!(components = components.len(), "compiling circuit");

        let variables = collect_variables(components);

        let mut invariant = System::new();
        for eq in components.iter().flat_map(Component::invariant_equations) {
            invariant.try_insert(eq)?;
        }
        for (node, currents) in node_currents(components) {
            let total = Expr::sum(currents.into_iter().map(Expr::func));
            tracing::debug!(node = %node, "current law");
            invariant.try_insert(Equation::new(total, Expr::zero()))?;
        }

        // equal left sides (parallel capacitors) are joined, never replaced
        let mut differential = System::new();
        for eq in components.iter().flat_map(Component::differential_equations) {
            differential.try_insert(eq)?;
        }
        let mut variant = System::new();
        for eq in components.iter().flat_map(Component::variant_equations) {
            variant.try_insert(eq)?;
        }

        let simplification = simplify(&invariant, &variables)?;
        info!(
            invariant = invariant.len(),
            resolved = simplification.resolved.len(),
            remaining = simplification.remaining.len(),
            "invariant equations simplified"
        );

        let reduced = differential.substitute_all(&simplification.resolved);
        let functions = reduced.functions();
        let unknowns: Vec<Symbol> = variables
            .iter()
            .filter(|v| functions.contains(*v))
            .cloned()
            .collect();

        let decoupling = decouple(&reduced, &unknowns);
        info!(
            unknowns = unknowns.len(),
            decoupled = decoupling.len(),
            dependent = decoupling.dependent.len(),
            "differential equations decoupled"
        );

        let mut underdetermined = decoupling.underdetermined.clone();
        let mut derived = BTreeMap::new();
        for (symbol, eq) in &decoupling.equations {
            match initial_conditions(symbol, eq) {
                Ok(d) => {
                    derived.insert(symbol.clone(), d);
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "no differential form");
                    underdetermined.push(symbol.clone());
                }
            }
        }
        for v in &variables {
            if !simplification.resolved.contains_key(v) && !functions.contains(v) {
                underdetermined.push(v.clone());
            }
        }
        if !underdetermined.is_empty() {
            warn!(count = underdetermined.len(), "underdetermined unknowns");
        }

        let parameters = invariant
            .params()
            .into_iter()
            .chain(differential.params())
            .chain(variant.params())
            .collect();

        Ok(Self {
            variables,
            invariant,
            differential,
            variant,
            simplification,
            reduced,
            decoupling,
            derived,
            underdetermined,
            parameters,
        })
    }

    /// All unknowns, in declaration order.
    pub fn variables(&self) -> &[Symbol] {
        &self.variables
    }

    /// Component and current-law equations as assembled.
    pub fn invariant_equations(&self) -> &System {
        &self.invariant
    }

    /// Integral-form equations as assembled.
    pub fn differential_equations(&self) -> &System {
        &self.differential
    }

    pub fn variant_equations(&self) -> &System {
        &self.variant
    }

    /// Unknowns determined by the invariant equations, as expressions over
    /// the remaining unknowns.
    pub fn resolved(&self) -> &BTreeMap<Symbol, Expr> {
        &self.simplification.resolved
    }

    /// Invariant equations left after simplification.
    pub fn remaining_equations(&self) -> &System {
        &self.simplification.remaining
    }

    /// Integral-form equations after substituting the resolved unknowns.
    pub fn reduced_equations(&self) -> &System {
        &self.reduced
    }

    /// One integral-form equation per decoupled unknown.
    pub fn decoupled(&self) -> &BTreeMap<Symbol, Equation> {
        &self.decoupling.equations
    }

    /// Unknowns expressed through other unknowns of the differential system.
    pub fn dependent(&self) -> &BTreeMap<Symbol, Expr> {
        &self.decoupling.dependent
    }

    /// ODE and initial values per decoupled unknown.
    pub fn derived(&self) -> &BTreeMap<Symbol, DerivedEquation> {
        &self.derived
    }

    pub fn underdetermined(&self) -> &[Symbol] {
        &self.underdetermined
    }

    /// Every parameter mentioned by any equation set.
    pub fn parameters(&self) -> &BTreeSet<Symbol> {
        &self.parameters
    }
}

/// Unknowns of all components, first occurrence wins.
fn collect_variables(components: &[Component]) -> Vec<Symbol> {
    let mut seen = BTreeSet::new();
    components
        .iter()
        .flat_map(Component::unknowns)
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::NodeId;
    use crate::components::{Capacitor, Reference, Resistor, VoltageSource};
    use crate::error::SymcircError;
    use approx::assert_relative_eq;

    fn rc() -> Vec<Component> {
        vec![
            VoltageSource::new("V1", [NodeId::new("in"), NodeId::ground()], 5.0).into(),
            Resistor::new("R1", [NodeId::new("in"), NodeId::new("out")], 1e3).into(),
            Capacitor::new("C1", [NodeId::new("out"), NodeId::ground()], 1e-6).into(),
            Reference::new("G", NodeId::ground()).into(),
        ]
    }

    #[test]
    fn test_variables_in_declaration_order() {
        let c = Compiler::new(&rc()).unwrap();
        let names: Vec<_> = c.variables().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "u_in",
                "u_0",
                "current_1_V1",
                "current_2_V1",
                "u_out",
                "current_1_R1",
                "current_2_R1",
                "current_1_C1",
                "current_2_C1"
            ]
        );
    }

    #[test]
    fn test_rc_reduces_to_one_unknown() {
        let c = Compiler::new(&rc()).unwrap();
        assert!(c.remaining_equations().is_empty());
        assert!(c.underdetermined().is_empty());
        assert_eq!(c.decoupled().len(), 1);
        assert_eq!(c.resolved().len(), c.variables().len() - 1);

        let (symbol, derived) = c.derived().iter().next().unwrap();
        assert_eq!(derived.order, 1);
        // the capacitor current starts at -V/R whatever its sign convention
        let i0 = derived.initial_value(0).unwrap().eval_at(0.0).unwrap();
        assert_relative_eq!(i0.abs(), 5e-3, max_relative = 1e-9);
        assert!(symbol.name().contains("C1"));
    }

    #[test]
    fn test_simplify_round_trip() {
        // every invariant equation holds once the resolved values are substituted
        let c = Compiler::new(&rc()).unwrap();
        for eq in c.invariant_equations() {
            let reduced = eq.substitute_all(c.resolved());
            assert!(reduced.is_identity(), "{} does not reduce to 0 = 0", eq);
        }
    }

    #[test]
    fn test_parallel_capacitors_keep_both_equations() {
        let components: Vec<Component> = vec![
            VoltageSource::new("V1", [NodeId::new("in"), NodeId::ground()], 1.0).into(),
            Resistor::new("R1", [NodeId::new("in"), NodeId::new("a")], 1.0).into(),
            Capacitor::new("C1", [NodeId::new("a"), NodeId::ground()], 1.0).into(),
            Capacitor::new("C2", [NodeId::new("a"), NodeId::ground()], 1.0).into(),
            Reference::new("G", NodeId::ground()).into(),
        ];
        let c = Compiler::new(&components).unwrap();
        assert_eq!(c.differential_equations().len(), 2);
        assert!(c.underdetermined().is_empty(), "{:?}", c.underdetermined());
        assert!(!c.derived().is_empty());
        assert_eq!(
            c.resolved().len() + c.derived().len() + c.dependent().len(),
            c.variables().len()
        );
    }

    #[test]
    fn test_parallel_sources_contradict() {
        let components: Vec<Component> = vec![
            VoltageSource::new("V1", [NodeId::new("a"), NodeId::ground()], 5.0).into(),
            VoltageSource::new("V2", [NodeId::new("a"), NodeId::ground()], 3.0).into(),
            Reference::new("G", NodeId::ground()).into(),
        ];
        assert!(matches!(
            Compiler::new(&components),
            Err(SymcircError::Contradiction { .. })
        ));
    }

    #[test]
    fn test_parameters_collected() {
        let components: Vec<Component> = vec![
            VoltageSource::new("V1", [NodeId::new("a"), NodeId::ground()], Expr::param("V")).into(),
            Resistor::new("R1", [NodeId::new("a"), NodeId::new("b")], Expr::param("R")).into(),
            Capacitor::new("C1", [NodeId::new("b"), NodeId::ground()], Expr::param("C")).into(),
            Reference::new("G", NodeId::ground()).into(),
        ];
        let c = Compiler::new(&components).unwrap();
        let names: Vec<_> = c.parameters().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["C", "R", "V"]);
    }

    #[test]
    fn test_floating_node_is_underdetermined() {
        let components: Vec<Component> = vec![
            Resistor::new("R1", [NodeId::new("a"), NodeId::new("b")], 1.0).into(),
            Reference::new("G", NodeId::new("b")).into(),
            Resistor::new("R2", [NodeId::new("c"), NodeId::new("d")], 1.0).into(),
        ];
        let c = Compiler::new(&components).unwrap();
        // u_c is written in terms of u_d, which nothing pins down
        let names: Vec<_> = c.underdetermined().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["u_d"]);
        assert!(c.resolved().contains_key(&Symbol::new("u_c")));
    }
}
