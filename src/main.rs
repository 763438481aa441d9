//! symcirc - transient solver for small linear circuits
//!
//! Compiles a netlist into one differential equation per unknown, solves
//! them and prints the result as CSV.
//!
//! # Usage
//!
//! ```bash
//! symcirc rc.cir --duration 5m --samples 200 --param C=2u > rc.csv
//! RUST_LOG=symcirc=debug symcirc rc.cir --numeric-only
//! symcirc rc.cir --sweep R=1k,2k,5k --sweep C
//! ```

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use clap::Parser;
use symcirc::{
    circuit::{validate_circuit, Circuit},
    dsl,
    error::{Result, SymcircError},
    expr::Symbol,
    output::{CsvOutput, DEFAULT_SAMPLES},
    solve_with_config,
    solver::{sweep, Axis},
    Function, Solution, SolverConfig, DEFAULT_DURATION,
};
use tracing_subscriber::EnvFilter;

/// Symbolic and numeric transient circuit solver
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the netlist file
    #[arg(value_name = "FILE")]
    circuit_file: PathBuf,

    /// Simulation duration in seconds (overrides .tran; suffixes like 5m allowed)
    #[arg(short, long, value_parser = parse_quantity)]
    duration: Option<f64>,

    /// Number of output rows
    #[arg(short, long, default_value_t = DEFAULT_SAMPLES)]
    samples: usize,

    /// Parameter value, NAME=VALUE (overrides .param)
    #[arg(short, long = "param", value_name = "NAME=VALUE", value_parser = parse_binding)]
    params: Vec<(String, f64)>,

    /// Swept parameter, NAME=V1,V2,... or NAME alone for every decade
    /// from 1e-9 to 1e6; one table per point
    #[arg(long = "sweep", value_name = "NAME[=VALUES]", value_parser = parse_axis)]
    sweeps: Vec<Axis>,

    /// Worker threads (defaults to available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Only try closed-form solutions
    #[arg(long, conflicts_with = "numeric_only")]
    symbolic_only: bool,

    /// Only run the numeric integrator
    #[arg(long)]
    numeric_only: bool,
}

fn parse_quantity(text: &str) -> std::result::Result<f64, String> {
    dsl::parse_value(text).ok_or_else(|| format!("'{}' is not a number", text))
}

fn parse_binding(text: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", text))?;
    Ok((name.trim().to_string(), parse_quantity(value)?))
}

fn parse_axis(text: &str) -> std::result::Result<Axis, String> {
    let Some((name, values)) = text.split_once('=') else {
        return Ok(Axis::decades(text.trim()));
    };
    let values = values
        .split(',')
        .map(|v| parse_quantity(v.trim()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Axis::new(name.trim(), values))
}

/// Drain a solution and write its table, columns in declaration order.
fn write_solution<W: io::Write>(
    output: &mut CsvOutput<W>,
    mut solution: Solution,
    samples: usize,
    duration: f64,
) -> Result<()> {
    let mut functions: Vec<Function> = solution.by_ref().collect();
    for failure in solution.failures() {
        tracing::warn!(error = %failure, "unknown not solved");
    }
    if functions.is_empty() {
        return Err(SymcircError::OutputError {
            message: "no unknown could be solved".to_string(),
        });
    }

    let order = solution.compiler().variables().to_vec();
    functions.sort_by_key(|f| order.iter().position(|v| v == f.id()).unwrap_or(usize::MAX));
    output.write_table(&functions, samples, duration)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    // Parse the netlist and build the circuit
    let ast = dsl::parse_file(&args.circuit_file)?;
    let mut circuit = Circuit::from_ast(ast)?;
    for (name, value) in &args.params {
        circuit.parameters.insert(Symbol::new(name), *value);
    }
    if let Some(duration) = args.duration {
        circuit.duration = Some(duration);
    }
    validate_circuit(&circuit)?;

    let duration = circuit.duration.unwrap_or(DEFAULT_DURATION);
    let mut config = SolverConfig::new();
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }
    if args.symbolic_only {
        config = config.symbolic_only();
    } else if args.numeric_only {
        config = config.numeric_only();
    }

    let parameters: BTreeMap<Symbol, f64> = circuit.parameters.clone();
    let mut output = CsvOutput::new(io::stdout().lock());
    if args.sweeps.is_empty() {
        let solution = solve_with_config(&circuit.components, duration, &parameters, config)?;
        return write_solution(&mut output, solution, args.samples, duration);
    }

    let axes = args.sweeps;
    let swept: Vec<Symbol> = axes.iter().map(|a| a.symbol.clone()).collect();
    for (point, solution) in sweep(&circuit.components, duration, &parameters, axes, config)? {
        let label: Vec<String> = swept.iter().map(|s| format!("{}={:e}", s, point[s])).collect();
        output.write_comment(&label.join(" "))?;
        write_solution(&mut output, solution?, args.samples, duration)?;
    }
    output.flush()
}
