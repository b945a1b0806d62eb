//! Recursive-descent parser for policy source and queries

pub mod lexer;

use crate::error::{EngineError, Result};
use crate::types::{Dictionary, Operator, Parameter, Rule, Term};
use lexer::{tokenize, Spanned, Token};

/// One top-level item of a policy source
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Rule(Rule),
    /// `?= goal;` self-check, validated when the source is loaded
    Query(Term),
}

/// Parse a complete policy source
pub fn parse_lines(src: &str, source_name: &str) -> Result<Vec<Line>> {
    let mut parser = Parser::new(src, source_name)?;
    let mut lines = Vec::new();
    while parser.peek().is_some() {
        if parser.eat(&Token::InlineQuery) {
            let goal = parser.parse_body()?;
            parser.expect(Token::Semi, "`;` after inline query")?;
            lines.push(Line::Query(goal));
        } else {
            lines.push(Line::Rule(parser.parse_rule()?));
        }
    }
    Ok(lines)
}

/// Parse a query goal; a trailing `;` is tolerated
pub fn parse_query(src: &str) -> Result<Term> {
    let mut parser = Parser::new(src, "<query>")?;
    let goal = parser.parse_body()?;
    parser.eat(&Token::Semi);
    if parser.peek().is_some() {
        return Err(parser.error("unexpected input after query"));
    }
    Ok(goal)
}

struct Parser<'a> {
    src: &'a str,
    source_name: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, source_name: &'a str) -> Result<Self> {
        match tokenize(src) {
            Ok(tokens) => Ok(Self {
                src,
                source_name,
                tokens,
                pos: 0,
            }),
            Err(span) => Err(parse_error(
                src,
                source_name,
                span.start,
                format!("unrecognised input `{}`", &src[span]),
            )),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<()> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn expect_name(&mut self, what: &str) -> Result<String> {
        match self.peek() {
            Some(Token::Name(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(format!("expected {}", what))),
        }
    }

    fn offset_at(&self, pos: usize) -> usize {
        self.tokens
            .get(pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.src.len())
    }

    fn error(&self, message: impl Into<String>) -> EngineError {
        self.error_at(self.pos, message)
    }

    fn error_at(&self, pos: usize, message: impl Into<String>) -> EngineError {
        let message = match self.tokens.get(pos) {
            Some((token, _)) => format!("{}, found {:?}", message.into(), token),
            None => format!("{}, found end of input", message.into()),
        };
        parse_error(self.src, self.source_name, self.offset_at(pos), message)
    }

    fn parse_rule(&mut self) -> Result<Rule> {
        let name = self.expect_name("rule name")?;
        self.expect(Token::LParen, "`(` after rule name")?;
        let mut params = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                params.push(self.parse_param()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                self.expect(Token::RParen, "`,` or `)` in rule head")?;
                break;
            }
        }
        let body = if self.eat(&Token::Define) {
            self.parse_body()?
        } else {
            Term::Boolean(true)
        };
        self.expect(Token::Semi, "`;` after rule")?;
        Ok(Rule { name, params, body })
    }

    fn parse_param(&mut self) -> Result<Parameter> {
        let term = self.parse_term()?;
        if self.eat(&Token::Colon) {
            let specializer = self.parse_term()?;
            return Ok(Parameter::new(term).with_specializer(specializer));
        }
        // A dictionary in head position matches any value carrying those fields.
        if let Term::Dictionary(_) = term {
            return Ok(Parameter::new(Term::var("_")).with_specializer(term));
        }
        Ok(Parameter::new(term))
    }

    fn parse_body(&mut self) -> Result<Term> {
        let mut branches = vec![self.parse_conjunction()?];
        while self.eat(&Token::Pipe) {
            branches.push(self.parse_conjunction()?);
        }
        Ok(if branches.len() == 1 {
            branches.remove(0)
        } else {
            Term::op(Operator::Or, branches)
        })
    }

    fn parse_conjunction(&mut self) -> Result<Term> {
        let mut goals = vec![self.parse_goal()?];
        while self.eat(&Token::Comma) {
            goals.push(self.parse_goal()?);
        }
        Ok(if goals.len() == 1 {
            goals.remove(0)
        } else {
            Term::op(Operator::And, goals)
        })
    }

    fn parse_goal(&mut self) -> Result<Term> {
        if self.eat(&Token::Bang) {
            let negated = self.parse_goal()?;
            return Ok(Term::op(Operator::Not, vec![negated]));
        }
        if self.eat(&Token::LParen) {
            let body = self.parse_body()?;
            self.expect(Token::RParen, "`)`")?;
            return Ok(body);
        }

        let left = self.parse_term()?;
        let operator = match self.peek() {
            Some(Token::Unify) => Operator::Unify,
            Some(Token::Eq) => Operator::Eq,
            Some(Token::Neq) => Operator::Neq,
            Some(Token::Lt) => Operator::Lt,
            Some(Token::Leq) => Operator::Leq,
            Some(Token::Gt) => Operator::Gt,
            Some(Token::Geq) => Operator::Geq,
            Some(Token::In) => Operator::In,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_term()?;
        Ok(Term::op(operator, vec![left, right]))
    }

    fn parse_term(&mut self) -> Result<Term> {
        let mut term = self.parse_primary()?;
        while self.eat(&Token::Dot) {
            let field = self.expect_name("field name after `.`")?;
            term = Term::dot(term, field);
        }
        Ok(term)
    }

    fn parse_primary(&mut self) -> Result<Term> {
        let start = self.pos;
        match self.bump() {
            Some(Token::Integer(i)) => Ok(Term::Integer(i)),
            Some(Token::Float(x)) => Ok(Term::Float(x)),
            Some(Token::String(s)) => Ok(Term::String(s)),
            Some(Token::True) => Ok(Term::Boolean(true)),
            Some(Token::False) => Ok(Term::Boolean(false)),
            Some(Token::Minus) => match self.bump() {
                Some(Token::Integer(i)) => Ok(Term::Integer(-i)),
                Some(Token::Float(x)) => Ok(Term::Float(-x)),
                _ => Err(self.error_at(start + 1, "expected a number after `-`")),
            },
            Some(Token::LBracket) => Ok(Term::List(self.parse_sequence(Token::RBracket, "`]`")?)),
            Some(Token::LBrace) => Ok(Term::Dictionary(self.parse_fields()?)),
            Some(Token::Name(name)) => {
                if self.eat(&Token::LParen) {
                    let args = self.parse_sequence(Token::RParen, "`)`")?;
                    Ok(Term::call(name, args))
                } else if self.eat(&Token::LBrace) {
                    let fields = self.parse_fields()?;
                    Ok(Term::InstanceLiteral {
                        class: name,
                        fields,
                    })
                } else {
                    Ok(Term::var(name))
                }
            }
            Some(_) => Err(self.error_at(start, "expected a term")),
            None => Err(self.error_at(start, "expected a term")),
        }
    }

    /// Comma-separated terms up to `close`; the opening bracket is consumed
    fn parse_sequence(&mut self, close: Token, what: &str) -> Result<Vec<Term>> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_term()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(close, what)?;
            return Ok(items);
        }
    }

    /// `name: term` pairs up to `}`; the opening brace is consumed
    fn parse_fields(&mut self) -> Result<Dictionary> {
        let mut fields = Dictionary::new();
        if self.eat(&Token::RBrace) {
            return Ok(fields);
        }
        loop {
            let key_pos = self.pos;
            let key = self.expect_name("field name")?;
            self.expect(Token::Colon, "`:` after field name")?;
            let value = self.parse_term()?;
            if fields.insert(key.clone(), value).is_some() {
                return Err(self.error_at(key_pos, format!("duplicate field `{}`", key)));
            }
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(Token::RBrace, "`,` or `}`")?;
            return Ok(fields);
        }
    }
}

fn parse_error(src: &str, source_name: &str, offset: usize, message: String) -> EngineError {
    let before = &src[..offset.min(src.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(before.len(), |nl| before.len() - nl - 1) + 1;
    EngineError::Parse {
        source_name: source_name.to_string(),
        line,
        column,
        message,
    }
}
