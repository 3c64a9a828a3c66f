//! Lexer for gate condition strings.
//!
//! Tokens carry their character position so parser errors can point at the
//! offending lexeme. Keywords (`AND`, `OR`, `NOT`, `exists`) are
//! case-insensitive; a word containing `*` is a PATTERN, a word of digits
//! is a NUMBER, anything else word-shaped is an IDENT.

use crate::ast::CmpOp;
use conductor_core::{ConductorError, ConductorResult};

/// A lexed token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What kind of token this is.
    pub kind: TokenKind,
    /// Zero-based character offset in the source.
    pub pos: usize,
    /// The raw source text.
    pub text: String,
}

/// Token kinds produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `:`
    Colon,
    /// `%`
    Percent,
    /// `AND` (any case)
    And,
    /// `OR` (any case)
    Or,
    /// `NOT` (any case)
    Not,
    /// `exists` (any case)
    Exists,
    /// A comparison operator.
    Op(CmpOp),
    /// A numeric literal.
    Number(f64),
    /// A word of letters, digits, `_`, `-`, `.`.
    Ident(String),
    /// A word containing at least one `*` wildcard.
    Pattern(String),
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '*')
}

/// Lexes a condition string into tokens.
pub fn lex(source: &str) -> ConductorResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let pos = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let simple = match c {
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            ':' => Some(TokenKind::Colon),
            '%' => Some(TokenKind::Percent),
            _ => None,
        };
        if let Some(kind) = simple {
            tokens.push(Token {
                kind,
                pos,
                text: c.to_string(),
            });
            i += 1;
            continue;
        }

        if matches!(c, '>' | '<' | '=') {
            let (op, len) = match (c, chars.get(i + 1)) {
                ('>', Some('=')) => (CmpOp::Ge, 2),
                ('<', Some('=')) => (CmpOp::Le, 2),
                ('>', _) => (CmpOp::Gt, 1),
                ('<', _) => (CmpOp::Lt, 1),
                ('=', _) => (CmpOp::Eq, 1),
                _ => unreachable!(),
            };
            tokens.push(Token {
                kind: TokenKind::Op(op),
                pos,
                text: chars[i..i + len].iter().collect(),
            });
            i += len;
            continue;
        }

        if is_word_char(c) {
            let start = i;
            while i < chars.len() && is_word_char(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(Token {
                kind: classify_word(&word),
                pos,
                text: word,
            });
            continue;
        }

        return Err(ConductorError::Parse {
            position: pos,
            lexeme: c.to_string(),
            message: "unexpected character".to_string(),
        });
    }

    Ok(tokens)
}

fn classify_word(word: &str) -> TokenKind {
    match word.to_ascii_uppercase().as_str() {
        "AND" => return TokenKind::And,
        "OR" => return TokenKind::Or,
        "NOT" => return TokenKind::Not,
        "EXISTS" => return TokenKind::Exists,
        _ => {}
    }
    if word.contains('*') {
        return TokenKind::Pattern(word.to_string());
    }
    if word.chars().all(|c| c.is_ascii_digit() || c == '.') {
        if let Ok(n) = word.parse::<f64>() {
            return TokenKind::Number(n);
        }
    }
    TokenKind::Ident(word.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lex_simple_check() {
        assert_eq!(kinds("typecheck"), vec![TokenKind::Ident("typecheck".into())]);
    }

    #[test]
    fn test_lex_keywords_case_insensitive() {
        assert_eq!(
            kinds("typecheck and Tests OR not exists"),
            vec![
                TokenKind::Ident("typecheck".into()),
                TokenKind::And,
                TokenKind::Ident("Tests".into()),
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::Exists,
            ]
        );
    }

    #[test]
    fn test_lex_threshold() {
        assert_eq!(
            kinds("evidence[coverage] >= 80%"),
            vec![
                TokenKind::Ident("evidence".into()),
                TokenKind::LBracket,
                TokenKind::Ident("coverage".into()),
                TokenKind::RBracket,
                TokenKind::Op(CmpOp::Ge),
                TokenKind::Number(80.0),
                TokenKind::Percent,
            ]
        );
    }

    #[test]
    fn test_lex_wildcard_is_pattern() {
        assert_eq!(
            kinds("memory:auth-*"),
            vec![
                TokenKind::Ident("memory".into()),
                TokenKind::Colon,
                TokenKind::Pattern("auth-*".into()),
            ]
        );
    }

    #[test]
    fn test_lex_operators() {
        assert_eq!(
            kinds("> < >= <= ="),
            vec![
                TokenKind::Op(CmpOp::Gt),
                TokenKind::Op(CmpOp::Lt),
                TokenKind::Op(CmpOp::Ge),
                TokenKind::Op(CmpOp::Le),
                TokenKind::Op(CmpOp::Eq),
            ]
        );
    }

    #[test]
    fn test_lex_positions() {
        let tokens = lex("typecheck AND tests").unwrap();
        assert_eq!(tokens[0].pos, 0);
        assert_eq!(tokens[1].pos, 10);
        assert_eq!(tokens[2].pos, 14);
    }

    #[test]
    fn test_lex_rejects_unexpected_character() {
        let err = lex("typecheck & tests").unwrap_err();
        match err {
            ConductorError::Parse { position, lexeme, .. } => {
                assert_eq!(position, 10);
                assert_eq!(lexeme, "&");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_lex_dotted_ident() {
        assert_eq!(
            kinds("traceability:req.links"),
            vec![
                TokenKind::Ident("traceability".into()),
                TokenKind::Colon,
                TokenKind::Ident("req.links".into()),
            ]
        );
    }
}
