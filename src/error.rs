//! Error types for the symcirc circuit solver.
//!
//! This module provides a unified error type [`SymcircError`] that covers
//! all error conditions that can occur during netlist parsing, circuit
//! construction, equation compilation, solving and evaluation.

use thiserror::Error;

/// Result type alias using [`SymcircError`].
pub type Result<T> = std::result::Result<T, SymcircError>;

/// Unified error type for all symcirc operations.
#[derive(Error, Debug)]
pub enum SymcircError {
    // ============ DSL Parsing Errors ============
    /// Error during lexical analysis
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Error during parsing
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Invalid component definition
    #[error("Invalid component '{name}' at line {line}: {message}")]
    InvalidComponent {
        name: String,
        line: usize,
        message: String,
    },

    /// Unknown component type
    #[error("Unknown component type '{component_type}' at line {line}")]
    UnknownComponentType { component_type: String, line: usize },

    /// Invalid parameter value
    #[error("Invalid parameter '{param}' for component '{component}': {message}")]
    InvalidParameter {
        component: String,
        param: String,
        message: String,
    },

    // ============ Circuit Construction Errors ============
    /// Duplicate component name
    #[error("Duplicate component name '{name}'")]
    DuplicateComponent { name: String },

    /// Two pins bound to the same current symbol
    #[error("Current '{current}' is bound by pins of '{first}' and '{second}'")]
    PinConflict {
        current: String,
        first: String,
        second: String,
    },

    /// Invalid circuit topology
    #[error("Invalid circuit topology: {message}")]
    InvalidTopology { message: String },

    // ============ Compilation Errors ============
    /// Two equations cannot hold at the same time
    #[error("Contradictory equations: '{first}' and '{second}'")]
    Contradiction { first: String, second: String },

    /// Joining equations with equal left-hand sides never settled
    #[error("Equation '{equation}' cannot be stored without a cycle")]
    CyclicEquations { equation: String },

    /// No single-unknown equation could be produced for a function
    #[error("Unknown '{symbol}' is underdetermined")]
    Underdetermined { symbol: String },

    // ============ Solve Errors ============
    /// A parameter of the compiled system has no numeric value
    #[error("No value supplied for parameter '{symbol}'")]
    MissingParameter { symbol: String },

    /// A parameter is still free when a number is requested
    #[error("Parameter '{symbol}' is unbound")]
    UnboundParameter { symbol: String },

    /// An unknown function is still free when a number is requested
    #[error("Function '{symbol}' has no value")]
    UnresolvedFunction { symbol: String },

    /// An algebraically resolved unknown depends on an unknown that failed
    #[error("Unknown '{symbol}' depends on unresolved '{dependency}'")]
    Unresolved { symbol: String, dependency: String },

    /// The numeric integration produced a non-finite value
    #[error("Numeric integration of '{symbol}' diverged at t = {time:.3e}")]
    NumericDivergence { symbol: String, time: f64 },

    /// The closed-form solver does not handle this equation
    #[error("No closed form for '{symbol}': {reason}")]
    NoSymbolicForm { symbol: String, reason: String },

    /// The quadratic step recurrence could not be derived
    #[error("No step recurrence for '{symbol}': {reason}")]
    NoRecurrence { symbol: String, reason: String },

    /// A solve attempt exceeded its time budget
    #[error("{strategy} solve of '{symbol}' timed out after {seconds:.1}s")]
    TimedOut {
        symbol: String,
        strategy: &'static str,
        seconds: f64,
    },

    /// A worker dropped its result without reporting
    #[error("{strategy} solve of '{symbol}' was lost by its worker")]
    WorkerLost {
        symbol: String,
        strategy: &'static str,
    },

    /// State-dependent equations are not supported by the solver
    #[error("{count} variant equation(s) present; only time-invariant circuits can be solved")]
    VariantEquations { count: usize },

    /// Invalid simulation parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    /// The worker pool could not be created
    #[error("Failed to start worker pool: {message}")]
    WorkerPool { message: String },

    // ============ I/O Errors ============
    /// Error reading circuit file
    #[error("Failed to read circuit file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing results
    #[error("Output error: {message}")]
    OutputError { message: String },
}

impl SymcircError {
    /// Create a lexer error
    pub fn lexer(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid component error
    pub fn invalid_component(name: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::InvalidComponent {
            name: name.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a contradiction error from the two conflicting equations
    pub fn contradiction(first: impl ToString, second: impl ToString) -> Self {
        Self::Contradiction {
            first: first.to_string(),
            second: second.to_string(),
        }
    }

    /// Create a closed-form failure
    pub fn no_symbolic_form(symbol: impl ToString, reason: impl Into<String>) -> Self {
        Self::NoSymbolicForm {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a recurrence failure
    pub fn no_recurrence(symbol: impl ToString, reason: impl Into<String>) -> Self {
        Self::NoRecurrence {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    /// True for failures that only concern a single unknown.
    pub fn is_per_unknown(&self) -> bool {
        matches!(
            self,
            Self::Underdetermined { .. }
                | Self::Unresolved { .. }
                | Self::NumericDivergence { .. }
                | Self::NoSymbolicForm { .. }
                | Self::NoRecurrence { .. }
                | Self::TimedOut { .. }
                | Self::WorkerLost { .. }
        )
    }
}
