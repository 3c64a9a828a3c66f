//! Recursive-descent parser for gate conditions.
//!
//! `AND` and `OR` are left-associative at the same precedence; callers
//! needing precedence parenthesise. Errors never recover by guessing: the
//! first problem rejects the condition wholesale, carrying the character
//! position and offending lexeme.

use crate::ast::{GateCheck, GateExpr, Threshold};
use crate::lexer::{lex, Token, TokenKind};
use conductor_core::{ConductorError, ConductorResult};

/// Parses a condition string into an expression tree.
pub fn parse(source: &str) -> ConductorResult<GateExpr> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        tokens,
        index: 0,
        source_len: source.chars().count(),
    };
    let expr = parser.expression()?;
    if let Some(extra) = parser.peek() {
        return Err(parser.error_at(extra.pos, &extra.text.clone(), "unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    source_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn error_at(&self, position: usize, lexeme: &str, message: &str) -> ConductorError {
        ConductorError::Parse {
            position,
            lexeme: lexeme.to_string(),
            message: message.to_string(),
        }
    }

    fn error_eof(&self, message: &str) -> ConductorError {
        ConductorError::Parse {
            position: self.source_len,
            lexeme: String::new(),
            message: format!("{message} (unexpected end of condition)"),
        }
    }

    // expression := term (('AND' | 'OR') term)*
    fn expression(&mut self) -> ConductorResult<GateExpr> {
        let mut node = self.term()?;
        while let Some(token) = self.peek() {
            let op = match token.kind {
                TokenKind::And => true,
                TokenKind::Or => false,
                _ => break,
            };
            self.advance();
            let rhs = self.term()?;
            node = if op {
                GateExpr::And(Box::new(node), Box::new(rhs))
            } else {
                GateExpr::Or(Box::new(node), Box::new(rhs))
            };
        }
        Ok(node)
    }

    // term := 'NOT'? factor
    fn term(&mut self) -> ConductorResult<GateExpr> {
        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Not)) {
            self.advance();
            let inner = self.factor()?;
            return Ok(GateExpr::Not(Box::new(inner)));
        }
        self.factor()
    }

    // factor := check | '(' expression ')'
    fn factor(&mut self) -> ConductorResult<GateExpr> {
        match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::LParen) => {
                self.advance();
                let expr = self.expression()?;
                match self.advance() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(expr),
                    Some(token) => {
                        Err(self.error_at(token.pos, &token.text, "expected ')'"))
                    }
                    None => Err(self.error_eof("expected ')'")),
                }
            }
            _ => Ok(GateExpr::Check(self.check()?)),
        }
    }

    fn check(&mut self) -> ConductorResult<GateCheck> {
        let token = match self.advance() {
            Some(token) => token,
            None => return Err(self.error_eof("expected a check")),
        };

        let pos = token.pos;
        match token.kind {
            // A bare wildcard pattern is a memory-store match.
            TokenKind::Pattern(pattern) => Ok(GateCheck::MemoryPattern(pattern)),
            TokenKind::Ident(name) => self.check_from_ident(pos, name),
            _ => Err(self.error_at(pos, &token.text, "expected a check")),
        }
    }

    fn check_from_ident(&mut self, pos: usize, name: String) -> ConductorResult<GateCheck> {
        // Colon forms: memory:, traceability:, evidence:
        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Colon)) {
            self.advance();
            return self.colon_check(pos, &name);
        }

        // Threshold form: IDENT '[' IDENT ']' OP NUMBER '%'?
        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::LBracket)) {
            self.advance();
            let metric = match self.advance() {
                Some(Token {
                    kind: TokenKind::Ident(metric),
                    ..
                }) => metric,
                Some(bad) => {
                    return Err(self.error_at(bad.pos, &bad.text, "expected a metric name"))
                }
                None => return Err(self.error_eof("expected a metric name")),
            };
            match self.advance() {
                Some(Token {
                    kind: TokenKind::RBracket,
                    ..
                }) => {}
                Some(bad) => return Err(self.error_at(bad.pos, &bad.text, "expected ']'")),
                None => return Err(self.error_eof("expected ']'")),
            }
            let threshold = self.threshold()?;
            if name == "evidence" && metric == "coverage" {
                return Ok(GateCheck::EvidenceCoverage(threshold));
            }
            return Ok(GateCheck::Metric {
                subject: name,
                metric,
                threshold,
            });
        }

        match name.as_str() {
            "typecheck" => Ok(GateCheck::Typecheck),
            "tests" => Ok(GateCheck::Tests),
            // coverage OP NUMBER '%'?
            "coverage" => {
                let threshold = self.threshold()?;
                Ok(GateCheck::EvidenceCoverage(threshold))
            }
            _ => Err(self.error_at(
                pos,
                &name,
                "unknown check (expected typecheck, tests, coverage, a pattern, or a colon check)",
            )),
        }
    }

    fn colon_check(&mut self, subject_pos: usize, subject: &str) -> ConductorResult<GateCheck> {
        match subject {
            "memory" => match self.advance() {
                Some(Token {
                    kind: TokenKind::Pattern(pattern),
                    ..
                }) => Ok(GateCheck::MemoryPattern(pattern)),
                Some(Token {
                    kind: TokenKind::Ident(name),
                    ..
                }) => Ok(GateCheck::MemoryPattern(name)),
                Some(bad) => Err(self.error_at(bad.pos, &bad.text, "expected a memory pattern")),
                None => Err(self.error_eof("expected a memory pattern")),
            },
            "traceability" => match self.advance() {
                Some(Token {
                    kind: TokenKind::Ident(field),
                    ..
                }) => Ok(GateCheck::Traceability(field)),
                Some(bad) => {
                    Err(self.error_at(bad.pos, &bad.text, "expected a traceability field"))
                }
                None => Err(self.error_eof("expected a traceability field")),
            },
            "evidence" => {
                let token = match self.advance() {
                    Some(token) => token,
                    None => return Err(self.error_eof("expected a chain id or 'coverage'")),
                };
                match token.kind {
                    TokenKind::Ident(word) if word == "coverage" => {
                        // The threshold is optional; a bare `evidence:coverage`
                        // demands complete chains.
                        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Op(_))) {
                            let threshold = self.threshold()?;
                            Ok(GateCheck::EvidenceCoverage(threshold))
                        } else {
                            Ok(GateCheck::EvidenceCoverage(Threshold {
                                op: crate::ast::CmpOp::Ge,
                                value: 100.0,
                                percent: true,
                            }))
                        }
                    }
                    TokenKind::Ident(id) => {
                        // Optional trailing `exists`.
                        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Exists)) {
                            self.advance();
                        }
                        Ok(GateCheck::EvidenceExists(id))
                    }
                    TokenKind::Number(_) => Ok(GateCheck::EvidenceExists(token.text.clone())),
                    _ => Err(self.error_at(
                        token.pos,
                        &token.text,
                        "expected a chain id or 'coverage'",
                    )),
                }
            }
            _ => Err(self.error_at(
                subject_pos,
                subject,
                "unknown colon check (expected memory, traceability, or evidence)",
            )),
        }
    }

    // OP NUMBER '%'?
    fn threshold(&mut self) -> ConductorResult<Threshold> {
        let op = match self.advance() {
            Some(Token {
                kind: TokenKind::Op(op),
                ..
            }) => op,
            Some(bad) => {
                return Err(self.error_at(bad.pos, &bad.text, "expected a comparison operator"))
            }
            None => return Err(self.error_eof("expected a comparison operator")),
        };
        let value = match self.advance() {
            Some(Token {
                kind: TokenKind::Number(value),
                ..
            }) => value,
            Some(bad) => return Err(self.error_at(bad.pos, &bad.text, "expected a number")),
            None => return Err(self.error_eof("expected a number")),
        };
        let percent = if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Percent)) {
            self.advance();
            true
        } else {
            false
        };
        Ok(Threshold { op, value, percent })
    }
}
