//! Tabular output for the CLI frontend.
//!
//! Writes sampled functions as CSV: a `t` column followed by one column
//! per function.

use std::io::Write;

use crate::error::{Result, SymcircError};
use crate::function::{sample_times, Function};

/// Default number of output rows.
pub const DEFAULT_SAMPLES: usize = 1000;

/// CSV writer over any byte sink.
pub struct CsvOutput<W: Write> {
    writer: W,
}

impl<W: Write> CsvOutput<W> {
    /// Create a new CSV writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    fn write_line(&mut self, fields: &[String]) -> Result<()> {
        writeln!(self.writer, "{}", fields.join(",")).map_err(output_error)
    }

    /// Write the header and `samples` rows covering `[0, duration]`.
    ///
    /// A value that cannot be evaluated is written as an empty field.
    pub fn write_table(&mut self, functions: &[Function], samples: usize, duration: f64) -> Result<()> {
        let header: Vec<String> = std::iter::once("t".to_string())
            .chain(functions.iter().map(|f| f.id().to_string()))
            .collect();
        self.write_line(&header)?;

        for t in sample_times(samples, duration) {
            let row: Vec<String> = std::iter::once(format!("{:e}", t))
                .chain(functions.iter().map(|f| match f.eval(t) {
                    Ok(v) => format!("{:e}", v),
                    Err(_) => String::new(),
                }))
                .collect();
            self.write_line(&row)?;
        }
        self.flush()
    }

    /// Write a `#` comment line, used to label tables of a sweep.
    pub fn write_comment(&mut self, text: &str) -> Result<()> {
        writeln!(self.writer, "# {}", text).map_err(output_error)
    }

    /// Flush the output stream.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(output_error)
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn output_error(e: std::io::Error) -> SymcircError {
    SymcircError::OutputError {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Expr, Symbol};
    use std::collections::BTreeMap;

    #[test]
    fn test_table_layout() {
        let f = Function::symbolic(Symbol::new("x"), Expr::num(2.0) * Expr::time(), BTreeMap::new());
        let g = Function::symbolic(Symbol::new("k"), Expr::param("k"), BTreeMap::new());
        let mut out = CsvOutput::new(Vec::new());
        out.write_table(&[f, g], 3, 1.0).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "t,x,k");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "1e0,2e0,");
    }

    #[test]
    fn test_comment_precedes_table() {
        let f = Function::symbolic(Symbol::new("x"), Expr::time(), BTreeMap::new());
        let mut out = CsvOutput::new(Vec::new());
        out.write_comment("R=1e3").unwrap();
        out.write_table(&[f], 2, 1.0).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# R=1e3");
        assert_eq!(lines[1], "t,x");
        assert_eq!(lines.len(), 4);
    }
}
