//! Core types for circuit representation.

use std::fmt;

use crate::expr::{Expr, Symbol};

/// Name of the ground node.
pub const GROUND: &str = "0";

/// A node of the circuit, identified by name.
/// `"0"` is ground; the netlist alias `GND` maps onto it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.eq_ignore_ascii_case("GND") {
            Self::ground()
        } else {
            Self(name)
        }
    }

    /// The ground node.
    pub fn ground() -> Self {
        Self(GROUND.to_string())
    }

    /// Check if this is the ground node.
    pub fn is_ground(&self) -> bool {
        self.0 == GROUND
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// The node potential symbol, `u_<name>`.
    pub fn potential(&self) -> Symbol {
        Symbol::new(format!("u_{}", self.0))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for NodeId {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// A unique identifier for a component in the circuit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub String);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ComponentId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A component terminal attached to a node.
///
/// `current` names the current flowing *into* the component through this pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pin {
    pub node: NodeId,
    pub owner: ComponentId,
    pub current: Symbol,
}

impl Pin {
    /// Create a pin with the default current name for its position
    /// (`index` starts at 1).
    pub fn new(node: NodeId, owner: ComponentId, index: usize) -> Self {
        let current = Self::default_current(index, &owner);
        Self { node, owner, current }
    }

    /// `current_<index>_<owner>`.
    pub fn default_current(index: usize, owner: &ComponentId) -> Symbol {
        Symbol::new(format!("current_{}_{}", index, owner))
    }

    /// The current entering the component through this pin, as a function of time.
    pub fn i(&self) -> Expr {
        Expr::func(self.current.clone())
    }

    /// The potential of the pin's node, as a function of time.
    pub fn u(&self) -> Expr {
        Expr::func(self.node.potential())
    }
}
