//! Netlist DSL parser.
//!
//! A SPICE-inspired, line-oriented text format for describing circuits.
//!
//! # Grammar Overview
//!
//! ```text
//! netlist     = { line }
//! line        = comment | directive | component | empty
//! comment     = ('#' | ';' | '*') { any_char }
//! directive   = '.' directive_name { argument }
//! component   = [keyword] name node+ [value] { param }
//!
//! directive_name = "node" | "param" | "tran"
//! keyword     = "REF"
//! node        = identifier | number | "GND"
//! value       = number | identifier
//! param       = identifier '=' value
//!
//! number      = ['-'] digit+ ['.' digit+] [('e'|'E') ['-'|'+'] digit+] [unit_suffix]
//! unit_suffix = 'p' | 'n' | 'u' | 'm' | 'k' | 'M' | 'G'
//! identifier  = (letter | '_') { letter | digit | '_' }
//! ```
//!
//! # Component Types
//!
//! | Type | Description | Syntax |
//! |------|-------------|--------|
//! | R | Resistor | `R<name> <n1> <n2> [value]` |
//! | C | Capacitor | `C<name> <n1> <n2> [value] [ic=<volts>]` |
//! | L | Inductor | `L<name> <n1> <n2> [value] [ic=<amps>]` |
//! | V | Voltage Source | `V<name> <n+> <n-> [value]` |
//! | REF | Reference | `REF <name> <node>` |
//!
//! A value that is an identifier names a parameter; an omitted value is a
//! parameter named after the component. Parameters are bound with `.param`
//! or from the command line.
//!
//! # Directives
//!
//! | Directive | Description | Syntax |
//! |-----------|-------------|--------|
//! | .node | Declare nodes | `.node <name>...` |
//! | .param | Bind parameters | `.param <name>=<number>...` |
//! | .tran | Simulation duration | `.tran <seconds>` |
//!
//! # Example
//!
//! ```text
//! # RC charging
//! .tran 5m
//! V1  in   0    5
//! R1  in   out  1k
//! C1  out  0    1u  ic=0
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{parse_value, Lexer, Token, TokenKind};
pub use parser::Parser;

use crate::error::{Result, SymcircError};

/// Parse a netlist string into an AST.
pub fn parse(input: &str) -> Result<CircuitAst> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer)?;
    parser.parse()
}

/// Parse a netlist file.
pub fn parse_file(path: &std::path::Path) -> Result<CircuitAst> {
    let content = std::fs::read_to_string(path).map_err(|e| SymcircError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse(&content)
}
