//! Component models.
//!
//! This module provides the two-terminal components the compiler knows:
//! - Linear: Resistor, Capacitor, Inductor
//! - Sources: Voltage Source, Reference (ground)
//!
//! Each component contributes symbolic equations over its own pins' currents
//! and node potentials. Equations split into three sets:
//!
//! - **invariant**: algebraic relations that hold at every instant
//! - **differential**: relations in integral form, `lhs = rhs + ∫₀ᵗ ...`
//! - **variant**: relations whose form depends on the circuit's state
//!   (none of the built-in components produce any)

mod linear;
mod sources;

pub use linear::{Capacitor, Inductor, Resistor};
pub use sources::{Reference, VoltageSource};

use crate::circuit::{ComponentId, NodeId, Pin};
use crate::dsl::{ComponentDef, ComponentType};
use crate::error::{Result, SymcircError};
use crate::expr::{Equation, Expr, Symbol};

/// Equation contributions of a component.
pub trait Element {
    fn id(&self) -> &ComponentId;

    /// The component's pins, in order.
    fn pins(&self) -> &[Pin];

    /// Nodes the component touches.
    fn nodes(&self) -> Vec<NodeId> {
        self.pins().iter().map(|p| p.node.clone()).collect()
    }

    fn invariant_equations(&self) -> Vec<Equation>;

    fn differential_equations(&self) -> Vec<Equation> {
        Vec::new()
    }

    fn variant_equations(&self) -> Vec<Equation> {
        Vec::new()
    }

    /// Unknown functions the component's equations mention, in a fixed order.
    fn unknowns(&self) -> Vec<Symbol>;
}

/// A circuit component.
#[derive(Debug, Clone)]
pub enum Component {
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    VoltageSource(VoltageSource),
    Reference(Reference),
}

impl Component {
    /// Create a component from a DSL definition.
    pub fn from_def(def: &ComponentDef, nodes: &[NodeId]) -> Result<Self> {
        let arity = || {
            SymcircError::invalid_component(
                &def.name,
                def.line,
                format!(
                    "expected {} nodes, got {}",
                    def.component_type.expected_node_count(),
                    nodes.len()
                ),
            )
        };

        // An omitted value becomes a parameter named after the component
        let value = def
            .value
            .as_ref()
            .map(|v| v.to_expr())
            .unwrap_or_else(|| Expr::param(def.name.as_str()));
        let initial = |key: &str| -> Result<Expr> {
            for param in def.params.keys() {
                if param != key {
                    return Err(SymcircError::InvalidParameter {
                        component: def.name.clone(),
                        param: param.clone(),
                        message: format!("expected only '{}'", key),
                    });
                }
            }
            Ok(def.params.get(key).map(|v| v.to_expr()).unwrap_or_else(Expr::zero))
        };
        let no_params = || -> Result<()> {
            match def.params.keys().next() {
                Some(param) => Err(SymcircError::InvalidParameter {
                    component: def.name.clone(),
                    param: param.clone(),
                    message: "component takes no parameters".to_string(),
                }),
                None => Ok(()),
            }
        };

        let id = ComponentId::from(def.name.as_str());
        let pair = || match nodes {
            [a, b] => Ok([a.clone(), b.clone()]),
            _ => Err(arity()),
        };
        match def.component_type {
            ComponentType::Resistor => {
                no_params()?;
                Ok(Resistor::new(id, pair()?, value).into())
            }
            ComponentType::Capacitor => Ok(Capacitor::new(id, pair()?, value)
                .with_initial_voltage(initial("ic")?)
                .into()),
            ComponentType::Inductor => Ok(Inductor::new(id, pair()?, value)
                .with_initial_current(initial("ic")?)
                .into()),
            ComponentType::VoltageSource => {
                no_params()?;
                Ok(VoltageSource::new(id, pair()?, value).into())
            }
            ComponentType::Reference => {
                let [node] = nodes else {
                    return Err(arity());
                };
                no_params()?;
                if def.value.is_some() {
                    return Err(SymcircError::invalid_component(
                        &def.name,
                        def.line,
                        "a reference takes no value",
                    ));
                }
                Ok(Reference::new(id, node.clone()).into())
            }
        }
    }

    fn element(&self) -> &dyn Element {
        match self {
            Component::Resistor(r) => r,
            Component::Capacitor(c) => c,
            Component::Inductor(l) => l,
            Component::VoltageSource(v) => v,
            Component::Reference(g) => g,
        }
    }

    /// Get the component ID.
    pub fn id(&self) -> &ComponentId {
        self.element().id()
    }

    pub fn pins(&self) -> &[Pin] {
        self.element().pins()
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.element().nodes()
    }

    pub fn invariant_equations(&self) -> Vec<Equation> {
        self.element().invariant_equations()
    }

    pub fn differential_equations(&self) -> Vec<Equation> {
        self.element().differential_equations()
    }

    pub fn variant_equations(&self) -> Vec<Equation> {
        self.element().variant_equations()
    }

    pub fn unknowns(&self) -> Vec<Symbol> {
        self.element().unknowns()
    }

    /// Check if this component stores energy (contributes differential equations).
    pub fn is_reactive(&self) -> bool {
        matches!(self, Component::Capacitor(_) | Component::Inductor(_))
    }
}

impl From<Resistor> for Component {
    fn from(r: Resistor) -> Self {
        Component::Resistor(r)
    }
}

impl From<Capacitor> for Component {
    fn from(c: Capacitor) -> Self {
        Component::Capacitor(c)
    }
}

impl From<Inductor> for Component {
    fn from(l: Inductor) -> Self {
        Component::Inductor(l)
    }
}

impl From<VoltageSource> for Component {
    fn from(v: VoltageSource) -> Self {
        Component::VoltageSource(v)
    }
}

impl From<Reference> for Component {
    fn from(g: Reference) -> Self {
        Component::Reference(g)
    }
}

/// Two pins with default currents.
fn two_pins(id: &ComponentId, nodes: [NodeId; 2]) -> [Pin; 2] {
    let [a, b] = nodes;
    [Pin::new(a, id.clone(), 1), Pin::new(b, id.clone(), 2)]
}

/// `i1 + i2 = 0`: whatever enters one pin leaves through the other.
fn conservation(pins: &[Pin; 2]) -> Equation {
    Equation::new(pins[0].i() + pins[1].i(), Expr::zero())
}

/// Current through the component from pin 1 to pin 2.
fn through(pins: &[Pin; 2]) -> Expr {
    (pins[0].i() - pins[1].i()) / Expr::num(2.0)
}

/// Potential drop from pin 1 to pin 2.
fn across(pins: &[Pin; 2]) -> Expr {
    pins[0].u() - pins[1].u()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::Value;
    use std::collections::HashMap;

    fn def(component_type: ComponentType, name: &str, value: Option<Value>) -> ComponentDef {
        ComponentDef {
            component_type,
            name: name.to_string(),
            nodes: vec!["a".to_string(), "0".to_string()],
            value,
            params: HashMap::new(),
            line: 1,
        }
    }

    #[test]
    fn test_omitted_value_becomes_parameter() {
        let d = def(ComponentType::Resistor, "R7", None);
        let c = Component::from_def(&d, &[NodeId::new("a"), NodeId::ground()]).unwrap();
        let params: Vec<_> = c
            .invariant_equations()
            .iter()
            .flat_map(|eq| eq.params())
            .collect();
        assert_eq!(params, vec![Symbol::new("R7")]);
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let mut d = def(ComponentType::Resistor, "R1", Some(Value::Number(1.0)));
        d.params.insert("ic".to_string(), Value::Number(0.0));
        let err = Component::from_def(&d, &[NodeId::new("a"), NodeId::ground()]).unwrap_err();
        assert!(matches!(err, SymcircError::InvalidParameter { .. }));
    }

    #[test]
    fn test_node_count_checked() {
        let d = def(ComponentType::Resistor, "R1", Some(Value::Number(1.0)));
        let err = Component::from_def(&d, &[NodeId::new("a")]).unwrap_err();
        assert!(matches!(err, SymcircError::InvalidComponent { ref message, .. } if message == "expected 2 nodes, got 1"));

        let d = def(ComponentType::Reference, "G", None);
        let err = Component::from_def(&d, &[NodeId::new("a"), NodeId::ground()]).unwrap_err();
        assert!(matches!(err, SymcircError::InvalidComponent { .. }));
        assert!(Component::from_def(&d, &[NodeId::ground()]).is_ok());
    }

    #[test]
    fn test_reactive() {
        let d = def(ComponentType::Capacitor, "C1", Some(Value::Number(1e-6)));
        let c = Component::from_def(&d, &[NodeId::new("a"), NodeId::ground()]).unwrap();
        assert!(c.is_reactive());
        assert_eq!(c.differential_equations().len(), 1);
    }
}
