//! Voltage sources and the reference (ground) component.

use super::{across, conservation, two_pins, Element};
use crate::circuit::{ComponentId, NodeId, Pin};
use crate::expr::{Equation, Expr, Symbol};

/// An ideal voltage source: `u1 - u2 = V`.
///
/// `V` may be any expression of `t`, which makes time-varying sources
/// possible from the library API.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    pub id: ComponentId,
    pub pins: [Pin; 2], // [positive, negative]
    pub voltage: Expr,
}

impl VoltageSource {
    /// Create a new voltage source.
    pub fn new(id: impl Into<ComponentId>, nodes: [NodeId; 2], voltage: impl Into<Expr>) -> Self {
        let id = id.into();
        Self {
            pins: two_pins(&id, nodes),
            id,
            voltage: voltage.into(),
        }
    }

    pub fn with_currents(mut self, currents: [Symbol; 2]) -> Self {
        let [a, b] = currents;
        self.pins[0].current = a;
        self.pins[1].current = b;
        self
    }
}

impl Element for VoltageSource {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn pins(&self) -> &[Pin] {
        &self.pins
    }

    fn invariant_equations(&self) -> Vec<Equation> {
        vec![
            conservation(&self.pins),
            Equation::new(across(&self.pins), self.voltage.clone()),
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

/// Fixes the potential of one node to zero. Carries no current.
#[derive(Debug, Clone)]
pub struct Reference {
    pub id: ComponentId,
    pub node: NodeId,
}

impl Reference {
    pub fn new(id: impl Into<ComponentId>, node: NodeId) -> Self {
        Self { id: id.into(), node }
    }
}

impl Element for Reference {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn pins(&self) -> &[Pin] {
        &[]
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.node.clone()]
    }

    fn invariant_equations(&self) -> Vec<Equation> {
        vec![Equation::new(Expr::func(self.node.potential()), Expr::zero())]
    }

    fn unknowns(&self) -> Vec<Symbol> {
        vec![self.node.potential()]
    }
}
