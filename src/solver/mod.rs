//! Per-unknown solvers.
//!
//! Every decoupled unknown is attacked twice, in parallel:
//!
//! - **symbolic**: closed form of a linear constant-coefficient ODE
//! - **numeric**: adaptive stepping with quadratic segments
//!
//! The first usable result wins. Unknowns that the compiler resolved
//! algebraically become functions as soon as every unknown they mention
//! has one. Which attempt wins a race is not deterministic; both produce
//! the same curve within the integration tolerance.

mod driver;
mod numeric;
mod pool;
mod sweep;
mod symbolic;
mod thinning;

pub use driver::Solution;
pub use numeric::{integrate, Recurrence, Segment, StepOutcome, Stepper, Trajectory};
pub use pool::{TaskHandle, TaskPoll, WorkerPool};
pub use sweep::{sweep, Axis, ParameterGrid, Sweep, DECADES};
pub use symbolic::solve_closed_form;
pub use thinning::{thin, Thinning};

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::info;

use crate::compiler::Compiler;
use crate::components::Component;
use crate::error::{Result, SymcircError};
use crate::expr::Symbol;

/// Squared slope change below which a step is accepted and doubled.
pub const DEFAULT_SMALL_ERROR: f64 = 1e-7;

/// Squared slope change above which a step is halved and retried.
pub const DEFAULT_LARGE_ERROR: f64 = 1e-6;

/// Smallest step, also the first one taken (seconds).
pub const DEFAULT_MIN_STEP: f64 = 1e-10;

/// Largest step (seconds).
pub const DEFAULT_MAX_STEP: f64 = 60.0;

/// Angular tolerance of curve thinning (degrees).
pub const DEFAULT_THINNING_ANGLE: f64 = 0.1;

/// Accepted steps between two thinning passes.
pub const DEFAULT_THINNING_BATCH: usize = 100_000;

/// Time budget of a single solve attempt.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration for the solver.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub small_error: f64,
    pub large_error: f64,
    pub min_step: f64,
    pub max_step: f64,
    pub thinning_angle: f64,
    pub thinning_batch: usize,
    /// Worker threads for solve attempts
    pub workers: usize,
    /// Per-attempt time budget, `None` for unlimited
    pub task_timeout: Option<Duration>,
    /// Try closed-form solutions
    pub symbolic: bool,
    /// Run the numeric integrator
    pub numeric: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            small_error: DEFAULT_SMALL_ERROR,
            large_error: DEFAULT_LARGE_ERROR,
            min_step: DEFAULT_MIN_STEP,
            max_step: DEFAULT_MAX_STEP,
            thinning_angle: DEFAULT_THINNING_ANGLE,
            thinning_batch: DEFAULT_THINNING_BATCH,
            workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
            task_timeout: Some(DEFAULT_TASK_TIMEOUT),
            symbolic: true,
            numeric: true,
        }
    }
}

impl SolverConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step acceptance bounds on the squared slope change.
    ///
    /// Below `small` a step is accepted and the next one doubled; above
    /// `large` it is halved and retried.
    pub fn with_error_bounds(mut self, small: f64, large: f64) -> Self {
        self.small_error = small;
        self.large_error = large;
        self
    }

    pub fn with_min_step(mut self, min_step: f64) -> Self {
        self.min_step = min_step;
        self
    }

    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step;
        self
    }

    /// Set the thinning tolerance (degrees) and batch size.
    pub fn with_thinning(mut self, angle: f64, batch: usize) -> Self {
        self.thinning_angle = angle;
        self.thinning_batch = batch;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Only try closed forms.
    pub fn symbolic_only(mut self) -> Self {
        self.symbolic = true;
        self.numeric = false;
        self
    }

    /// Only run the numeric integrator.
    pub fn numeric_only(mut self) -> Self {
        self.symbolic = false;
        self.numeric = true;
        self
    }

    fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(SymcircError::InvalidSimulationParam { message });
        if !self.symbolic && !self.numeric {
            return invalid("both symbolic and numeric solving are disabled".to_string());
        }
        if !(self.min_step > 0.0 && self.min_step <= self.max_step) {
            return invalid(format!(
                "step bounds must satisfy 0 < min_step <= max_step, got {} and {}",
                self.min_step, self.max_step
            ));
        }
        if !(self.small_error <= self.large_error) {
            return invalid(format!(
                "small_error {} exceeds large_error {}",
                self.small_error, self.large_error
            ));
        }
        if self.thinning_batch == 0 {
            return invalid("thinning batch must be positive".to_string());
        }
        Ok(())
    }
}

/// Solve a circuit over `[0, duration]` with the default configuration.
pub fn solve(components: &[Component], duration: f64, parameters: &BTreeMap<Symbol, f64>) -> Result<Solution> {
    solve_with_config(components, duration, parameters, SolverConfig::default())
}

/// Solve a circuit over `[0, duration]`.
///
/// Fails up front on invalid durations, contradictory equations,
/// state-dependent equations and missing parameter values. Everything that
/// concerns a single unknown is reported by [`Solution::failures`] instead.
pub fn solve_with_config(
    components: &[Component],
    duration: f64,
    parameters: &BTreeMap<Symbol, f64>,
    config: SolverConfig,
) -> Result<Solution> {
    let compiler = prepare(components, duration, &config)?;
    if let Some(missing) = compiler.parameters().iter().find(|p| !parameters.contains_key(*p)) {
        return Err(SymcircError::MissingParameter {
            symbol: missing.to_string(),
        });
    }

    info!(
        unknowns = compiler.variables().len(),
        decoupled = compiler.derived().len(),
        duration,
        workers = config.workers,
        "solving"
    );
    Solution::start(compiler, duration, parameters.clone(), config)
}

/// Checks shared by every solve: duration, configuration, compilation and
/// the absence of state-dependent equations.
fn prepare(components: &[Component], duration: f64, config: &SolverConfig) -> Result<Compiler> {
    if !(duration > 0.0 && duration.is_finite()) {
        return Err(SymcircError::InvalidSimulationParam {
            message: format!("duration must be positive, got {}", duration),
        });
    }
    config.validate()?;

    let compiler = Compiler::new(components)?;
    if !compiler.variant_equations().is_empty() {
        return Err(SymcircError::VariantEquations {
            count: compiler.variant_equations().len(),
        });
    }
    Ok(compiler)
}
