//! Circuit graph structure.

use std::collections::BTreeMap;

use super::types::NodeId;
use crate::components::{Component, Reference};
use crate::dsl::CircuitAst;
use crate::error::Result;
use crate::expr::Symbol;

/// Id of the reference added on ground when a netlist declares none.
pub const AUTO_REFERENCE: &str = "REF_GND";

/// A circuit ready for compilation.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    /// All components, in declaration order
    pub components: Vec<Component>,

    /// All nodes, in order of first appearance
    pub nodes: Vec<NodeId>,

    /// Parameter values bound in the netlist
    pub parameters: BTreeMap<Symbol, f64>,

    /// Simulation duration from the netlist, if any
    pub duration: Option<f64>,
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component, registering its nodes.
    pub fn with_component(mut self, component: impl Into<Component>) -> Self {
        self.push(component.into());
        self
    }

    /// Bind a parameter value.
    pub fn with_parameter(mut self, name: impl Into<Symbol>, value: f64) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    fn push(&mut self, component: Component) {
        for node in component.nodes() {
            self.register_node(node);
        }
        self.components.push(component);
    }

    fn register_node(&mut self, node: NodeId) {
        if !self.nodes.contains(&node) {
            self.nodes.push(node);
        }
    }

    /// Build a circuit from a parsed AST.
    ///
    /// A [`Reference`] is added on ground when some component touches ground
    /// and the netlist declares no reference of its own.
    pub fn from_ast(ast: CircuitAst) -> Result<Self> {
        let mut circuit = Circuit::new();
        for name in &ast.nodes {
            circuit.register_node(NodeId::new(name.as_str()));
        }

        for def in &ast.components {
            let nodes: Vec<NodeId> = def.nodes.iter().map(|n| NodeId::new(n.as_str())).collect();
            circuit.push(Component::from_def(def, &nodes)?);
        }

        let has_reference = circuit
            .components
            .iter()
            .any(|c| matches!(c, Component::Reference(_)));
        if !has_reference && circuit.nodes.iter().any(NodeId::is_ground) {
            tracing::debug!("adding implicit reference on ground");
            circuit.push(Reference::new(AUTO_REFERENCE, NodeId::ground()).into());
        }

        circuit.parameters = ast
            .parameters
            .into_iter()
            .map(|(name, value)| (Symbol::new(name), value))
            .collect();
        circuit.duration = ast.duration;

        tracing::info!(
            components = circuit.components.len(),
            nodes = circuit.nodes.len(),
            parameters = circuit.parameters.len(),
            "circuit built"
        );
        Ok(circuit)
    }

    /// Find a node by name.
    pub fn find_node(&self, name: &str) -> Option<&NodeId> {
        let wanted = NodeId::new(name);
        self.nodes.iter().find(|n| **n == wanted)
    }

    /// Currents entering each node, grouped per node.
    pub fn node_currents(&self) -> Vec<(NodeId, Vec<Symbol>)> {
        node_currents(&self.components)
    }
}

/// Currents of all pins attached to each node, nodes in order of first
/// appearance among the components' pins.
pub fn node_currents(components: &[Component]) -> Vec<(NodeId, Vec<Symbol>)> {
    let mut out: Vec<(NodeId, Vec<Symbol>)> = Vec::new();
    for pin in components.iter().flat_map(Component::pins) {
        match out.iter_mut().find(|(node, _)| *node == pin.node) {
            Some((_, currents)) => currents.push(pin.current.clone()),
            None => out.push((pin.node.clone(), vec![pin.current.clone()])),
        }
    }
    out
}
