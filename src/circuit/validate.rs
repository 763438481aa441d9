//! Circuit validation.

use std::collections::{HashMap, HashSet};

use crate::components::Component;
use crate::error::{Result, SymcircError};

use super::Circuit;

/// Check the construction invariants of a component list.
///
/// - No two components share an id
/// - No two pins share a current symbol
pub fn validate_components(components: &[Component]) -> Result<()> {
    let mut ids = HashSet::new();
    let mut currents = HashMap::new();
    for component in components {
        if !ids.insert(component.id().clone()) {
            return Err(SymcircError::DuplicateComponent {
                name: component.id().to_string(),
            });
        }
        for pin in component.pins() {
            if let Some(first) = currents.insert(pin.current.clone(), pin.owner.clone()) {
                return Err(SymcircError::PinConflict {
                    current: pin.current.to_string(),
                    first: first.to_string(),
                    second: pin.owner.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Validate a circuit for solving.
pub fn validate_circuit(circuit: &Circuit) -> Result<()> {
    if circuit.components.is_empty() {
        return Err(SymcircError::InvalidTopology {
            message: "Circuit has no components".to_string(),
        });
    }

    validate_components(&circuit.components)?;

    if !circuit
        .components
        .iter()
        .any(|c| matches!(c, Component::Reference(_)))
    {
        return Err(SymcircError::InvalidTopology {
            message: "Circuit has no reference node".to_string(),
        });
    }

    if let Some(duration) = circuit.duration {
        if !(duration > 0.0 && duration.is_finite()) {
            return Err(SymcircError::InvalidSimulationParam {
                message: format!("duration must be positive, got {}", duration),
            });
        }
    }

    for (symbol, value) in &circuit.parameters {
        if !value.is_finite() {
            return Err(SymcircError::InvalidParameter {
                component: "<netlist>".to_string(),
                param: symbol.to_string(),
                message: format!("value {} is not finite", value),
            });
        }
    }

    Ok(())
}
