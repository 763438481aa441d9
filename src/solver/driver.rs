//! Solve driver.
//!
//! A [`Solution`] owns the worker pool and every pending attempt. Iterating
//! it polls the attempts, merges winners into the algebraically resolved
//! unknowns and yields functions as they become available.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::compiler::{Compiler, DerivedEquation};
use crate::error::{Result, SymcircError};
use crate::expr::{Expr, Symbol};
use crate::function::{Curve, Function};

use super::numeric::{bind_parameters, integrate, Trajectory};
use super::pool::{TaskHandle, TaskPoll, WorkerPool};
use super::symbolic::solve_closed_form;
use super::SolverConfig;

/// Pause between two poll rounds that produced nothing.
const IDLE_SLEEP: Duration = Duration::from_millis(1);

const SYMBOLIC: &str = "symbolic";
const NUMERIC: &str = "numeric";

/// The two attempts on one decoupled unknown.
struct Race {
    symbolic: Option<TaskHandle<Result<Expr>>>,
    numeric: Option<TaskHandle<Result<Trajectory>>>,
    errors: Vec<SymcircError>,
}

impl Race {
    fn is_over(&self) -> bool {
        self.symbolic.is_none() && self.numeric.is_none()
    }
}

/// Outcome of polling one attempt.
enum Attempt<T> {
    Won(T),
    Waiting,
    Failed,
}

/// Lazily produced solution of a circuit.
///
/// Yields one [`Function`] per unknown that could be solved, in the order
/// they become available. After the iterator is exhausted,
/// [`Solution::failures`] lists what went wrong for the others.
pub struct Solution {
    compiler: Compiler,
    duration: f64,
    parameters: BTreeMap<Symbol, f64>,
    task_timeout: Option<Duration>,
    // held so workers stay alive while attempts are pending
    _pool: WorkerPool,
    races: BTreeMap<Symbol, Race>,
    algebraic: BTreeMap<Symbol, Expr>,
    solved: BTreeMap<Symbol, Function>,
    failed: BTreeSet<Symbol>,
    ready: VecDeque<Function>,
    failures: Vec<SymcircError>,
}

impl Solution {
    pub(super) fn start(
        compiler: Compiler,
        duration: f64,
        parameters: BTreeMap<Symbol, f64>,
        config: SolverConfig,
    ) -> Result<Self> {
        let pool = WorkerPool::new(config.workers)?;
        let bindings: BTreeMap<Symbol, Expr> = parameters
            .iter()
            .map(|(s, v)| (s.clone(), Expr::num(*v)))
            .collect();

        let mut races = BTreeMap::new();
        for (symbol, derived) in compiler.derived() {
            let bound = bind_parameters(derived, &parameters);
            races.insert(symbol.clone(), submit(&pool, symbol, bound, duration, &config));
        }

        let algebraic = compiler
            .resolved()
            .iter()
            .chain(compiler.dependent())
            .map(|(s, v)| (s.clone(), v.substitute_all(&bindings)))
            .collect();

        let mut failures = Vec::new();
        let mut failed = BTreeSet::new();
        for symbol in compiler.underdetermined() {
            failures.push(SymcircError::Underdetermined {
                symbol: symbol.to_string(),
            });
            failed.insert(symbol.clone());
        }

        let mut solution = Self {
            compiler,
            duration,
            parameters,
            task_timeout: config.task_timeout,
            _pool: pool,
            races,
            algebraic,
            solved: BTreeMap::new(),
            failed,
            ready: VecDeque::new(),
            failures,
        };
        solution.propagate();
        Ok(solution)
    }

    /// The compiled equations being solved.
    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Per-unknown errors collected so far.
    pub fn failures(&self) -> &[SymcircError] {
        &self.failures
    }

    /// Functions produced so far, by unknown.
    pub fn solved(&self) -> &BTreeMap<Symbol, Function> {
        &self.solved
    }

    /// Poll every race once. Returns true if anything changed.
    fn poll_round(&mut self) -> bool {
        let mut progress = false;
        let symbols: Vec<Symbol> = self.races.keys().cloned().collect();
        for symbol in symbols {
            let Some(mut race) = self.races.remove(&symbol) else {
                continue;
            };

            // symbolic results take precedence within a round
            let winner = match self.poll_attempt(&symbol, SYMBOLIC, &mut race.symbolic, &mut race.errors) {
                Attempt::Won(expr) => Some(Function::symbolic(symbol.clone(), expr, self.parameters.clone())),
                Attempt::Failed => {
                    progress = true;
                    None
                }
                Attempt::Waiting => None,
            };
            let winner = match winner {
                Some(f) => Some(f),
                None => match self.poll_attempt(&symbol, NUMERIC, &mut race.numeric, &mut race.errors) {
                    Attempt::Won(trajectory) => Some(Function::sampled(
                        symbol.clone(),
                        Curve::new(trajectory.times, trajectory.values),
                    )),
                    Attempt::Failed => {
                        progress = true;
                        None
                    }
                    Attempt::Waiting => None,
                },
            };

            if let Some(function) = winner {
                if !race.is_over() {
                    debug!(symbol = %symbol, "discarding the slower attempt");
                }
                info!(symbol = %symbol, symbolic = function.is_symbolic(), "solved");
                self.accept(function);
                progress = true;
            } else if race.is_over() {
                warn!(symbol = %symbol, "every attempt failed");
                self.failures.append(&mut race.errors);
                self.failed.insert(symbol);
            } else {
                self.races.insert(symbol, race);
            }
        }
        if progress {
            self.propagate();
        }
        progress
    }

    fn poll_attempt<T>(
        &self,
        symbol: &Symbol,
        strategy: &'static str,
        slot: &mut Option<TaskHandle<Result<T>>>,
        errors: &mut Vec<SymcircError>,
    ) -> Attempt<T> {
        let Some(handle) = slot else {
            return Attempt::Waiting;
        };
        let outcome = match handle.poll() {
            TaskPoll::Ready(Ok(value)) => {
                *slot = None;
                return Attempt::Won(value);
            }
            TaskPoll::Ready(Err(e)) => e,
            TaskPoll::Lost => SymcircError::WorkerLost {
                symbol: symbol.to_string(),
                strategy,
            },
            TaskPoll::Pending => match self.task_timeout {
                Some(limit) if handle.elapsed() > limit => SymcircError::TimedOut {
                    symbol: symbol.to_string(),
                    strategy,
                    seconds: handle.elapsed().as_secs_f64(),
                },
                _ => return Attempt::Waiting,
            },
        };
        debug!(symbol = %symbol, strategy, error = %outcome, "attempt failed");
        errors.push(outcome);
        *slot = None;
        Attempt::Failed
    }

    fn accept(&mut self, function: Function) {
        self.solved.insert(function.id().clone(), function.clone());
        self.ready.push_back(function);
    }

    /// Turn algebraic unknowns whose inputs are all solved into functions,
    /// until nothing changes.
    fn propagate(&mut self) {
        loop {
            let mut changed = false;
            let symbols: Vec<Symbol> = self.algebraic.keys().cloned().collect();
            for symbol in symbols {
                let Some(expr) = self.algebraic.get(&symbol) else {
                    continue;
                };
                let inputs = expr.functions();
                if let Some(bad) = inputs.iter().find(|s| self.failed.contains(*s)) {
                    self.failures.push(SymcircError::Unresolved {
                        symbol: symbol.to_string(),
                        dependency: bad.to_string(),
                    });
                    self.algebraic.remove(&symbol);
                    self.failed.insert(symbol);
                    changed = true;
                    continue;
                }
                if !inputs.iter().all(|s| self.solved.contains_key(s)) {
                    continue;
                }
                let Some(expr) = self.algebraic.remove(&symbol) else {
                    continue;
                };
                self.accept(self.combine(&symbol, expr, &inputs));
                changed = true;
            }
            if !changed {
                break;
            }
        }
    }

    /// Inline symbolic inputs; keep the rest as inputs of a derived function.
    fn combine(&self, symbol: &Symbol, expr: Expr, inputs: &BTreeSet<Symbol>) -> Function {
        let mut closed = BTreeMap::new();
        let mut sampled = BTreeMap::new();
        for input in inputs {
            if let Some(function) = self.solved.get(input) {
                match function.expr() {
                    Some(e) => {
                        closed.insert(input.clone(), e.clone());
                    }
                    None => {
                        sampled.insert(input.clone(), function.clone());
                    }
                }
            }
        }
        let expr = expr.substitute_all(&closed).normalize();
        if sampled.is_empty() {
            Function::symbolic(symbol.clone(), expr, self.parameters.clone())
        } else {
            Function::derived(symbol.clone(), expr, sampled)
        }
    }

    /// Report whatever is still waiting when the races are over.
    fn finish(&mut self) {
        for (symbol, expr) in std::mem::take(&mut self.algebraic) {
            let dependency = expr
                .functions()
                .into_iter()
                .find(|s| !self.solved.contains_key(s))
                .map(|s| s.to_string())
                .unwrap_or_default();
            self.failures.push(SymcircError::Unresolved {
                symbol: symbol.to_string(),
                dependency,
            });
        }
        if !self.failures.is_empty() {
            warn!(failures = self.failures.len(), "solve finished with failures");
        }
    }
}

impl fmt::Debug for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Solution")
            .field("duration", &self.duration)
            .field("pending", &self.races.keys().collect::<Vec<_>>())
            .field("solved", &self.solved.keys().collect::<Vec<_>>())
            .field("failures", &self.failures.len())
            .finish()
    }
}

impl Iterator for Solution {
    type Item = Function;

    fn next(&mut self) -> Option<Function> {
        loop {
            if let Some(function) = self.ready.pop_front() {
                return Some(function);
            }
            if self.races.is_empty() {
                self.finish();
                return None;
            }
            if !self.poll_round() {
                std::thread::sleep(IDLE_SLEEP);
            }
        }
    }
}

/// Submit the attempts the configuration asks for.
fn submit(pool: &WorkerPool, symbol: &Symbol, eq: DerivedEquation, duration: f64, config: &SolverConfig) -> Race {
    let symbolic = config.symbolic.then(|| {
        let eq = eq.clone();
        pool.submit(format!("{} {}", SYMBOLIC, symbol), move || solve_closed_form(&eq))
    });
    let numeric = config.numeric.then(|| {
        let config = config.clone();
        let timeout = config.task_timeout;
        pool.submit(format!("{} {}", NUMERIC, symbol), move || {
            let deadline = timeout.map(|limit| Instant::now() + limit);
            integrate(&eq, duration, &config, deadline)
        })
    });
    Race {
        symbolic,
        numeric,
        errors: Vec::new(),
    }
}
