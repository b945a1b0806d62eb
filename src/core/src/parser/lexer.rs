//! Tokenizer for policy source

use logos::{Lexer, Logos};
use std::ops::Range;

/// Policy language tokens
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"([ \t\r\n\f]+|#[^\n]*)")]
pub enum Token {
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("in")]
    In,

    #[regex("[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Name(String),
    #[regex("[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Integer(i64),
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
    #[regex(r#""([^"\\]|\\.)*""#, unescape)]
    String(String),

    #[token(":=")]
    Define,
    #[token("?=")]
    InlineQuery,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token("|")]
    Pipe,
    #[token("!")]
    Bang,
    #[token("=")]
    Unify,
    #[token("==")]
    Eq,
    #[token("!=")]
    Neq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Leq,
    #[token(">")]
    Gt,
    #[token(">=")]
    Geq,
    #[token(".")]
    Dot,
    #[token("-")]
    Minus,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
}

fn unescape(lex: &mut Lexer<Token>) -> Option<String> {
    let raw = lex.slice();
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            _ => return None,
        }
    }
    Some(out)
}

/// Token with its byte span in the source
pub type Spanned = (Token, Range<usize>);

/// Split source into tokens; on failure returns the span of the bad input
pub fn tokenize(src: &str) -> Result<Vec<Spanned>, Range<usize>> {
    let mut lexer = Token::lexer(src);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        match token {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => return Err(lexer.span()),
        }
    }
    Ok(tokens)
}
