//! Abstract Syntax Tree types for the netlist DSL.

use std::collections::HashMap;

use crate::expr::Expr;

/// Complete AST representation of a parsed netlist.
#[derive(Debug, Clone, Default)]
pub struct CircuitAst {
    /// All component instances, in file order
    pub components: Vec<ComponentDef>,
    /// `.param` assignments, in file order
    pub parameters: Vec<(String, f64)>,
    /// `.tran` duration in seconds
    pub duration: Option<f64>,
    /// Nodes declared with `.node`
    pub nodes: Vec<String>,
}

impl CircuitAst {
    /// Create a new empty netlist AST.
    pub fn new() -> Self {
        Self::default()
    }
}

/// A component value: a literal or a named parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Param(String),
}

impl Value {
    pub fn to_expr(&self) -> Expr {
        match self {
            Value::Number(v) => Expr::num(*v),
            Value::Param(name) => Expr::param(name.as_str()),
        }
    }
}

/// A component definition from the DSL.
#[derive(Debug, Clone)]
pub struct ComponentDef {
    pub component_type: ComponentType,
    /// Unique component name
    pub name: String,
    /// Connected node names, ground normalised to `"0"`
    pub nodes: Vec<String>,
    /// Main value (resistance, capacitance, inductance, voltage)
    pub value: Option<Value>,
    /// `key=value` parameters, keys lowercased
    pub params: HashMap<String, Value>,
    /// Source line number for error reporting
    pub line: usize,
}

/// Component types supported by the DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    Resistor,
    Capacitor,
    Inductor,
    VoltageSource,
    /// Ground reference for one node
    Reference,
}

impl ComponentType {
    /// Parse a component type from its DSL prefix.
    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix.to_ascii_uppercase() {
            'R' => Some(Self::Resistor),
            'C' => Some(Self::Capacitor),
            'L' => Some(Self::Inductor),
            'V' => Some(Self::VoltageSource),
            _ => None,
        }
    }

    /// Parse a component type from a keyword that precedes the name.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "REF" => Some(Self::Reference),
            _ => None,
        }
    }

    /// Get the expected number of nodes for this component type.
    pub fn expected_node_count(&self) -> usize {
        match self {
            Self::Reference => 1,
            _ => 2,
        }
    }
}
