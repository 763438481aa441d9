//! Parser for the netlist DSL.

use std::collections::HashMap;

use super::ast::*;
use super::lexer::{parse_value, Lexer, Token, TokenKind};
use crate::error::{Result, SymcircError};

/// Parser for netlist DSL.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Create a new parser with the given lexer.
    pub fn new(mut lexer: Lexer<'a>) -> Result<Self> {
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    /// Parse the entire netlist.
    pub fn parse(&mut self) -> Result<CircuitAst> {
        let mut ast = CircuitAst::new();

        while self.current.kind != TokenKind::Eof {
            match self.current.kind {
                TokenKind::Newline => {
                    self.advance()?;
                    continue;
                }
                TokenKind::Directive => self.parse_directive(&mut ast)?,
                TokenKind::Identifier => {
                    let component = self.parse_component()?;
                    ast.components.push(component);
                }
                _ => {
                    return Err(SymcircError::parse(
                        self.current.line,
                        format!("unexpected token: {:?}", self.current.text),
                    ));
                }
            }

            match self.current.kind {
                TokenKind::Newline => self.advance()?,
                TokenKind::Eof => {}
                _ => {
                    return Err(SymcircError::parse(
                        self.current.line,
                        format!("unexpected trailing token: {:?}", self.current.text),
                    ));
                }
            }
        }

        Ok(ast)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.current.kind == kind {
            let tok = self.current.clone();
            self.advance()?;
            Ok(tok)
        } else {
            Err(SymcircError::parse(
                self.current.line,
                format!("expected {:?}, got {:?}", kind, self.current.kind),
            ))
        }
    }

    fn at_line_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Newline | TokenKind::Eof)
    }

    fn expect_number(&mut self) -> Result<f64> {
        let tok = self.expect(TokenKind::Number)?;
        parse_value(&tok.text).ok_or_else(|| SymcircError::parse(tok.line, format!("invalid number: {}", tok.text)))
    }

    /// A number or a parameter name.
    fn parse_value(&mut self) -> Result<Value> {
        match self.current.kind {
            TokenKind::Number => self.expect_number().map(Value::Number),
            TokenKind::Identifier => Ok(Value::Param(self.expect(TokenKind::Identifier)?.text)),
            _ => Err(SymcircError::parse(
                self.current.line,
                format!("expected value, got {:?}", self.current.text),
            )),
        }
    }

    fn parse_directive(&mut self, ast: &mut CircuitAst) -> Result<()> {
        let directive = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        match directive.to_lowercase().as_str() {
            ".node" => {
                while !self.at_line_end() {
                    let node = self.parse_node()?;
                    if !ast.nodes.contains(&node) {
                        ast.nodes.push(node);
                    }
                }
            }
            ".param" => {
                while !self.at_line_end() {
                    let name = self.expect(TokenKind::Identifier)?.text;
                    self.expect(TokenKind::Equals)?;
                    let value = self.expect_number()?;
                    ast.parameters.push((name, value));
                }
            }
            ".tran" => {
                let duration = self.expect_number()?;
                if duration <= 0.0 {
                    return Err(SymcircError::parse(line, "duration must be positive"));
                }
                ast.duration = Some(duration);
            }
            _ => {
                return Err(SymcircError::parse(line, format!("unknown directive: {}", directive)));
            }
        }

        Ok(())
    }

    /// A node name; numeric names are kept verbatim and `GND` becomes `"0"`.
    fn parse_node(&mut self) -> Result<String> {
        match self.current.kind {
            TokenKind::Identifier | TokenKind::Number => {
                let text = self.current.text.clone();
                self.advance()?;
                if text.eq_ignore_ascii_case("GND") {
                    Ok("0".to_string())
                } else {
                    Ok(text)
                }
            }
            _ => Err(SymcircError::parse(
                self.current.line,
                format!("expected node name, got {:?}", self.current.text),
            )),
        }
    }

    fn parse_component(&mut self) -> Result<ComponentDef> {
        let first_token = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        // Keywords first, so REF isn't mistaken for a resistor
        let (component_type, name) = if let Some(ct) = ComponentType::from_keyword(&first_token) {
            let actual_name = self.expect(TokenKind::Identifier)?.text;
            (ct, actual_name)
        } else {
            let first_char = first_token.chars().next().unwrap_or('?');
            let ct = ComponentType::from_prefix(first_char).ok_or_else(|| SymcircError::UnknownComponentType {
                component_type: first_token.clone(),
                line,
            })?;
            (ct, first_token)
        };

        let expected_nodes = component_type.expected_node_count();
        let mut nodes = Vec::with_capacity(expected_nodes);
        while nodes.len() < expected_nodes {
            if self.at_line_end() {
                return Err(SymcircError::invalid_component(
                    &name,
                    line,
                    format!("expected {} nodes, got {}", expected_nodes, nodes.len()),
                ));
            }
            nodes.push(self.parse_node()?);
        }

        let mut value = None;
        let mut params = HashMap::new();
        while !self.at_line_end() {
            let tok = self.current.clone();
            self.advance()?;

            // key=value
            if tok.kind == TokenKind::Identifier && self.current.kind == TokenKind::Equals {
                self.advance()?;
                let v = self.parse_value()?;
                if params.insert(tok.text.to_lowercase(), v).is_some() {
                    return Err(SymcircError::InvalidParameter {
                        component: name,
                        param: tok.text,
                        message: "given twice".to_string(),
                    });
                }
                continue;
            }

            if value.is_some() {
                return Err(SymcircError::invalid_component(
                    &name,
                    line,
                    format!("unexpected extra value {:?}", tok.text),
                ));
            }
            value = Some(match tok.kind {
                TokenKind::Number => Value::Number(
                    parse_value(&tok.text)
                        .ok_or_else(|| SymcircError::parse(line, format!("invalid number: {}", tok.text)))?,
                ),
                TokenKind::Identifier => Value::Param(tok.text),
                _ => {
                    return Err(SymcircError::parse(
                        line,
                        format!("unexpected token: {:?}", tok.text),
                    ))
                }
            });
        }

        Ok(ComponentDef {
            component_type,
            name,
            nodes,
            value,
            params,
            line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse;

    #[test]
    fn test_parse_resistor() {
        let ast = parse("R1 in out 10k").unwrap();
        assert_eq!(ast.components.len(), 1);
        assert_eq!(ast.components[0].component_type, ComponentType::Resistor);
        assert_eq!(ast.components[0].name, "R1");
        assert_eq!(ast.components[0].nodes, vec!["in", "out"]);
        assert_eq!(ast.components[0].value, Some(Value::Number(10_000.0)));
    }

    #[test]
    fn test_parse_parameter_values() {
        let ast = parse("V1 in GND\nR1 in out Rload\n").unwrap();
        assert_eq!(ast.components[0].nodes, vec!["in", "0"]);
        assert_eq!(ast.components[0].value, None);
        assert_eq!(ast.components[1].value, Some(Value::Param("Rload".to_string())));
    }

    #[test]
    fn test_parse_initial_condition() {
        let ast = parse("C1 out 0 1u ic=2.5").unwrap();
        let c = &ast.components[0];
        assert_eq!(c.params.get("ic"), Some(&Value::Number(2.5)));
    }

    #[test]
    fn test_parse_directives() {
        let input = ".param R1=1k C=1u\n.tran 5m\n.node out\nREF G1 0\n";
        let ast = parse(input).unwrap();
        assert_eq!(
            ast.parameters,
            vec![("R1".to_string(), 1000.0), ("C".to_string(), 1e-6)]
        );
        approx::assert_relative_eq!(ast.duration.unwrap(), 5e-3);
        assert_eq!(ast.nodes, vec!["out"]);
        assert_eq!(ast.components[0].component_type, ComponentType::Reference);
        assert_eq!(ast.components[0].name, "G1");
        assert_eq!(ast.components[0].nodes, vec!["0"]);
    }

    #[test]
    fn test_parse_with_comments() {
        let input = "# This is a comment\nR1 in out 1k ; inline comment style\n* spice style\n";
        let ast = parse(input).unwrap();
        assert_eq!(ast.components.len(), 1);
    }

    #[test]
    fn test_missing_nodes() {
        let err = parse("R1 in").unwrap_err();
        assert!(matches!(err, SymcircError::InvalidComponent { line: 1, .. }));
    }

    #[test]
    fn test_unknown_component() {
        let err = parse("\nQ1 a b c").unwrap_err();
        assert!(matches!(err, SymcircError::UnknownComponentType { line: 2, .. }));
    }

    #[test]
    fn test_unknown_directive() {
        assert!(matches!(parse(".model X D").unwrap_err(), SymcircError::ParseError { .. }));
    }
}
