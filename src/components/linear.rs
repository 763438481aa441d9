//! Linear passive components: Resistor, Capacitor, Inductor.

use super::{across, conservation, through, two_pins, Element};
use crate::circuit::{ComponentId, NodeId, Pin};
use crate::expr::{Equation, Expr, Symbol};

/// A resistor: `u1 - u2 = R·i`.
#[derive(Debug, Clone)]
pub struct Resistor {
    pub id: ComponentId,
    pub pins: [Pin; 2],
    pub resistance: Expr,
}

impl Resistor {
    /// Create a new resistor.
    pub fn new(id: impl Into<ComponentId>, nodes: [NodeId; 2], resistance: impl Into<Expr>) -> Self {
        let id = id.into();
        Self {
            pins: two_pins(&id, nodes),
            id,
            resistance: resistance.into(),
        }
    }

    /// Use explicit current names instead of the defaults.
    pub fn with_currents(mut self, currents: [Symbol; 2]) -> Self {
        let [a, b] = currents;
        self.pins[0].current = a;
        self.pins[1].current = b;
        self
    }
}

impl Element for Resistor {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn pins(&self) -> &[Pin] {
        &self.pins
    }

    fn invariant_equations(&self) -> Vec<Equation> {
        vec![
            conservation(&self.pins),
            Equation::new(across(&self.pins), self.resistance.clone() * through(&self.pins)),
        ]
    }

    fn unknowns(&self) -> Vec<Symbol> {
        let [p1, p2] = &self.pins;
        vec![
            p1.node.potential(),
            p2.node.potential(),
            p1.current.clone(),
            p2.current.clone(),
        ]
    }
}

/// A capacitor with an initial voltage `U0`.
///
/// Integral form: `C·(u1 - u2) = C·U0 + ∫₀ᵗ i`.
#[derive(Debug, Clone)]
pub struct Capacitor {
    pub id: ComponentId,
    pub pins: [Pin; 2],
    pub capacitance: Expr,
    pub initial_voltage: Expr,
}

impl Capacitor {
    /// Create a new, discharged capacitor.
    pub fn new(id: impl Into<ComponentId>, nodes: [NodeId; 2], capacitance: impl Into<Expr>) -> Self {
        let id = id.into();
        Self {
            pins: two_pins(&id, nodes),
            id,
            capacitance: capacitance.into(),
            initial_voltage: Expr::zero(),
        }
    }

    pub fn with_initial_voltage(mut self, voltage: impl Into<Expr>) -> Self {
        self.initial_voltage = voltage.into();
        self
    }

    pub fn with_currents(mut self, currents: [Symbol; 2]) -> Self {
        let [a, b] = currents;
        self.pins[0].current = a;
        self.pins[1].current = b;
        self
    }
}

impl Element for Capacitor {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn pins(&self) -> &[Pin] {
        &self.pins
    }

    fn invariant_equations(&self) -> Vec<Equation> {
        vec![conservation(&self.pins)]
    }

    fn differential_equations(&self) -> Vec<Equation> {
        let c = self.capacitance.clone();
        vec![Equation::new(
            c.clone() * across(&self.pins),
            c * self.initial_voltage.clone() + Expr::integral(through(&self.pins)),
        )]
    }

    fn unknowns(&self) -> Vec<Symbol> {
        let [p1, p2] = &self.pins;
        vec![
            p1.current.clone(),
            p2.current.clone(),
            p1.node.potential(),
            p2.node.potential(),
        ]
    }
}

/// An inductor with an initial current `I0` flowing from pin 1 to pin 2.
///
/// Integral form: `L·i = L·I0 + ∫₀ᵗ (u1 - u2)`. `I0` is the through
/// current at `t = 0` in the same direction as `i`, hence the plus sign;
/// a netlist `ic=` value is taken as that current.
#[derive(Debug, Clone)]
pub struct Inductor {
    pub id: ComponentId,
    pub pins: [Pin; 2],
    pub inductance: Expr,
    pub initial_current: Expr,
}

impl Inductor {
    /// Create a new inductor carrying no current.
    pub fn new(id: impl Into<ComponentId>, nodes: [NodeId; 2], inductance: impl Into<Expr>) -> Self {
        let id = id.into();
        Self {
            pins: two_pins(&id, nodes),
            id,
            inductance: inductance.into(),
            initial_current: Expr::zero(),
        }
    }

    pub fn with_initial_current(mut self, current: impl Into<Expr>) -> Self {
        self.initial_current = current.into();
        self
    }

    pub fn with_currents(mut self, currents: [Symbol; 2]) -> Self {
        let [a, b] = currents;
        self.pins[0].current = a;
        self.pins[1].current = b;
        self
    }
}

impl Element for Inductor {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn pins(&self) -> &[Pin] {
        &self.pins
    }

    fn invariant_equations(&self) -> Vec<Equation> {
        vec![conservation(&self.pins)]
    }

    fn differential_equations(&self) -> Vec<Equation> {
        let l = self.inductance.clone();
        vec![Equation::new(
            l.clone() * through(&self.pins),
            l * self.initial_current.clone() + Expr::integral(across(&self.pins)),
        )]
    }

    fn unknowns(&self) -> Vec<Symbol> {
        let [p1, p2] = &self.pins;
        vec![
            p1.current.clone(),
            p2.current.clone(),
            p1.node.potential(),
            p2.node.potential(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn lookup(e: &Expr, _t: f64) -> Option<f64> {
        match e {
            Expr::Func { sym, order: 0 } => match sym.name() {
                "u_a" => Some(3.0),
                "u_b" => Some(1.0),
                "current_1_R1" => Some(0.002),
                "current_2_R1" => Some(-0.002),
                _ => None,
            },
            _ => None,
        }
    }

    #[test]
    fn test_resistor_ohms_law() {
        let r = Resistor::new("R1", [NodeId::new("a"), NodeId::new("b")], 1000.0);
        let eqs = r.invariant_equations();
        assert_eq!(eqs.len(), 2);
        // 3 - 1 = 1000 * 0.002
        let residual = eqs[1].residual().to_expr();
        assert_relative_eq!(residual.eval(0.0, &lookup).unwrap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(eqs[0].residual().to_expr().eval(0.0, &lookup).unwrap(), 0.0);
    }

    #[test]
    fn test_capacitor_initial_voltage() {
        let c = Capacitor::new("C1", [NodeId::new("a"), NodeId::ground()], 1e-6).with_initial_voltage(2.0);
        let eq = &c.differential_equations()[0];
        // at t = 0 the integral vanishes: C*(u_a(0) - u_0(0)) = C*2
        let at_zero = eq.at_zero();
        assert!(!at_zero.rhs.has_integral());
        assert_eq!(at_zero.rhs.normalize(), Expr::num(2e-6));
    }

    #[test]
    fn test_inductor_initial_current_sign() {
        let l = Inductor::new("L1", [NodeId::new("a"), NodeId::new("b")], 2.0).with_initial_current(0.5);
        let eq = l.differential_equations()[0].at_zero();
        // L·i(0) = L·I0, so i(0) = +I0
        assert_eq!(eq.rhs.normalize(), Expr::num(1.0));
        let i0 = eq.lhs.eval(0.0, &|e, _| match e {
            Expr::Initial { sym, .. } if sym.name() == "current_1_L1" => Some(0.5),
            Expr::Initial { sym, .. } if sym.name() == "current_2_L1" => Some(-0.5),
            _ => None,
        });
        assert_relative_eq!(i0.unwrap(), 1.0);
    }

    #[test]
    fn test_inductor_unknown_order() {
        let l = Inductor::new("L1", [NodeId::new("a"), NodeId::new("b")], Expr::param("L"));
        let names: Vec<_> = l.unknowns().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["current_1_L1", "current_2_L1", "u_a", "u_b"]);
        assert_eq!(l.differential_equations()[0].params().len(), 1);
    }
}
