//! End-to-end tests: netlist in, functions of time out.

use std::collections::BTreeMap;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use symcirc::expr::Symbol;
use symcirc::{dsl, solve_with_config, Circuit, Function, Solution, SolverConfig, SymcircError};

const RC: &str = "\
# RC charging, tau = 1ms
.tran 5m
V1 in  0   5
R1 in  out 1k
C1 out 0   1u
";

const RLC: &str = "\
# series RLC, underdamped
.tran 8
V1 in 0 1
R1 in a 1
L1 a  b 1
C1 b  0 1
";

fn circuit(netlist: &str) -> Circuit {
    Circuit::from_ast(dsl::parse(netlist).unwrap()).unwrap()
}

/// Drain a solution, returning it so its failures can be inspected.
fn solve_all(circuit: &Circuit, config: SolverConfig) -> (BTreeMap<Symbol, Function>, Solution) {
    let duration = circuit.duration.unwrap();
    let mut solution = solve_with_config(&circuit.components, duration, &circuit.parameters, config).unwrap();
    let functions = solution.by_ref().map(|f| (f.id().clone(), f)).collect();
    (functions, solution)
}

fn rc_charge(t: f64) -> f64 {
    5.0 * (1.0 - (-t / 1e-3).exp())
}

fn rlc_capacitor(t: f64) -> f64 {
    let w = 3.0f64.sqrt() / 2.0;
    1.0 - (-t / 2.0).exp() * ((w * t).cos() + (w * t).sin() / (2.0 * w))
}

#[test]
fn test_rc_closed_form() {
    let rc = circuit(RC);
    let (functions, solution) = solve_all(&rc, SolverConfig::new().symbolic_only());
    assert!(solution.failures().is_empty(), "{:?}", solution.failures());

    let out = &functions[&Symbol::new("u_out")];
    assert!(out.is_symbolic());
    for t in [0.0, 0.5e-3, 1e-3, 2e-3, 5e-3] {
        assert_abs_diff_eq!(out.eval(t).unwrap(), rc_charge(t), epsilon = 1e-6);
    }
}

#[test]
fn test_rc_numeric() {
    let rc = circuit(RC);
    let (functions, solution) = solve_all(&rc, SolverConfig::new().numeric_only());
    assert!(solution.failures().is_empty(), "{:?}", solution.failures());

    let out = &functions[&Symbol::new("u_out")];
    // relative accuracy, with an absolute floor for the start at 0 V
    for t in [0.0, 0.3e-3, 1e-3, 2.5e-3, 5e-3] {
        assert_relative_eq!(out.eval(t).unwrap(), rc_charge(t), epsilon = 1e-6, max_relative = 1e-3);
    }
}

#[test]
fn test_every_unknown_is_produced() {
    let rc = circuit(RC);
    let duration = rc.duration.unwrap();
    let mut solution =
        solve_with_config(&rc.components, duration, &rc.parameters, SolverConfig::new()).unwrap();
    let ids: Vec<Symbol> = solution.by_ref().map(|f| f.id().clone()).collect();
    assert!(solution.failures().is_empty());
    for variable in solution.compiler().variables() {
        assert!(ids.contains(variable), "missing {}", variable);
    }
    assert_eq!(ids.len(), solution.compiler().variables().len());
}

#[test]
fn test_current_law_holds_at_knots() {
    let rc = circuit(RC);
    let (functions, solution) = solve_all(&rc, SolverConfig::new().numeric_only());
    assert!(solution.failures().is_empty());

    let sampled = functions
        .values()
        .find_map(|f| f.knots().map(|(times, _)| times.to_vec()))
        .expect("numeric solve yields a sampled function");
    assert!(sampled.len() > 2);

    for (_, currents) in rc.node_currents() {
        for &t in sampled.iter().step_by(sampled.len() / 20 + 1) {
            let total: f64 = currents.iter().map(|i| functions[i].eval(t).unwrap()).sum();
            assert_abs_diff_eq!(total, 0.0, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_sampled_curve_is_continuous_at_knots() {
    let rc = circuit(RC);
    let (functions, _) = solve_all(&rc, SolverConfig::new().numeric_only());

    for function in functions.values() {
        let Some((times, values)) = function.knots() else {
            continue;
        };
        let scale = values.iter().fold(0.0f64, |m, v| m.max(v.abs())).max(1e-12);
        for k in 1..times.len() - 1 {
            let h = (times[k + 1] - times[k]).min(times[k] - times[k - 1]) * 1e-6;
            assert_abs_diff_eq!(function.eval(times[k]).unwrap(), values[k], epsilon = 1e-9 * scale);
            let left = function.eval(times[k] - h).unwrap();
            let right = function.eval(times[k] + h).unwrap();
            assert_abs_diff_eq!(left, right, epsilon = 1e-4 * scale);
        }
    }
}

#[test]
fn test_rlc_closed_form_and_numeric_agree() {
    let rlc = circuit(RLC);
    let (symbolic, solution) = solve_all(&rlc, SolverConfig::new().symbolic_only());
    assert!(solution.failures().is_empty(), "{:?}", solution.failures());
    let (numeric, solution) = solve_all(&rlc, SolverConfig::new().numeric_only());
    assert!(solution.failures().is_empty(), "{:?}", solution.failures());

    let b = Symbol::new("u_b");
    for t in [0.5, 1.0, 2.0, 4.0, 8.0] {
        let exact = rlc_capacitor(t);
        assert_abs_diff_eq!(symbolic[&b].eval(t).unwrap(), exact, epsilon = 1e-4);
        assert_abs_diff_eq!(numeric[&b].eval(t).unwrap(), exact, epsilon = 5e-3);
    }
}

#[test]
fn test_parallel_capacitors() {
    let parallel = circuit("V1 in 0 1\nR1 in a 1\nC1 a 0 1\nC2 a 0 1\n.tran 4\n");
    let (functions, solution) = solve_all(&parallel, SolverConfig::new().symbolic_only());
    assert!(solution.failures().is_empty(), "{:?}", solution.failures());
    assert_eq!(functions.len(), solution.compiler().variables().len());

    // 2 F through 1 ohm
    let a = &functions[&Symbol::new("u_a")];
    for t in [0.0, 1.0, 2.0, 4.0] {
        assert_abs_diff_eq!(a.eval(t).unwrap(), 1.0 - (-t / 2.0f64).exp(), epsilon = 1e-6);
    }
    let c1 = &functions[&Symbol::new("current_1_C1")];
    let c2 = &functions[&Symbol::new("current_1_C2")];
    assert_abs_diff_eq!(c1.eval(1.0).unwrap(), c2.eval(1.0).unwrap(), epsilon = 1e-6);
}

#[test]
fn test_parameters_from_netlist_and_overrides() {
    let netlist = "\
.param V=2 C=1
.tran 3
V1 in  0   V
R1 in  out R
C1 out 0   C
";
    let mut rc = circuit(netlist);
    let duration = rc.duration.unwrap();
    let err = solve_with_config(&rc.components, duration, &rc.parameters, SolverConfig::new()).unwrap_err();
    assert!(matches!(err, SymcircError::MissingParameter { ref symbol } if symbol == "R"));

    rc.parameters.insert(Symbol::new("R"), 1.0);
    let (functions, solution) = solve_all(&rc, SolverConfig::new().symbolic_only());
    assert!(solution.failures().is_empty(), "{:?}", solution.failures());
    let out = &functions[&Symbol::new("u_out")];
    assert_abs_diff_eq!(out.eval(1.0).unwrap(), 2.0 * (1.0 - (-1.0f64).exp()), epsilon = 1e-6);
}

#[test]
fn test_parallel_sources_contradict() {
    let shorted = circuit("V1 a 0 1\nV2 a 0 2\nR1 a 0 1\n.tran 1\n");
    let err = solve_with_config(
        &shorted.components,
        1.0,
        &shorted.parameters,
        SolverConfig::new(),
    )
    .unwrap_err();
    assert!(matches!(err, SymcircError::Contradiction { .. }));
}

#[test]
fn test_floating_node_is_reported() {
    let floating = circuit("V1 a 0 1\nR1 a b 1\nR2 c d 1\n.tran 1\n");
    let (functions, solution) = solve_all(&floating, SolverConfig::new().symbolic_only());
    assert_abs_diff_eq!(functions[&Symbol::new("u_b")].eval(0.5).unwrap(), 1.0, epsilon = 1e-12);
    assert!(!functions.contains_key(&Symbol::new("u_d")));
    assert!(solution
        .failures()
        .iter()
        .any(|e| matches!(e, SymcircError::Underdetermined { ref symbol } if symbol == "u_d")));
}
