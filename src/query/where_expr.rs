//! Predicate (`where`) Evaluator (`spec.md` §4.8): typed comparisons over
//! metadata categories with numeric coercion. Hand-written recursive descent,
//! grounded on `original_source/redbiom/where_expr.py::whereeval` -- same
//! anti-generic-parser rationale as [`super::set_expr`].
//!
//! Precedence, loosest to tightest: `or`, `and`, comparison chain.
//! A chained comparison (`(age >= 5) <= 15`) folds left-to-right exactly as
//! `where_expr.py::Compare` does: each operator narrows the running result
//! rather than independently testing the original operand.

use std::collections::BTreeMap;

use super::error::QueryError;
use crate::metadata::MetadataStore;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Num(f64),
    Str(String),
    And,
    Or,
    In,
    NotIn,
    Is,
    IsNot,
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    LParen,
    RParen,
    Comma,
}

fn lex(input: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == quote => break,
                        Some(c) => s.push(c),
                        None => return Err(QueryError::Syntax("unterminated string".into())),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Eq);
                } else {
                    return Err(QueryError::Syntax("expected '==', found '='".into()));
                }
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::NotEq);
                } else {
                    return Err(QueryError::Syntax("expected '!=', found '!'".into()));
                }
            }
            '<' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::LtE);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::GtE);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            c if c.is_ascii_digit() || (c == '-' && chars.clone().nth(1).is_some_and(|d| d.is_ascii_digit())) => {
                let mut num = String::new();
                if c == '-' {
                    num.push(c);
                    chars.next();
                }
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        num.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: f64 = num
                    .parse()
                    .map_err(|_| QueryError::Syntax(format!("bad number: {num}")))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match ident.as_str() {
                    "and" => tokens.push(Token::And),
                    "or" => tokens.push(Token::Or),
                    "is" => {
                        let mut lookahead = String::new();
                        let mut probe = chars.clone();
                        while let Some(&c) = probe.peek() {
                            if c.is_whitespace() {
                                probe.next();
                            } else {
                                break;
                            }
                        }
                        while let Some(&c) = probe.peek() {
                            if c.is_alphanumeric() || c == '_' {
                                lookahead.push(c);
                                probe.next();
                            } else {
                                break;
                            }
                        }
                        if lookahead == "not" {
                            chars = probe;
                            tokens.push(Token::IsNot);
                        } else {
                            tokens.push(Token::Is);
                        }
                    }
                    "not" => {
                        let mut probe = chars.clone();
                        while let Some(&c) = probe.peek() {
                            if c.is_whitespace() {
                                probe.next();
                            } else {
                                break;
                            }
                        }
                        let mut lookahead = String::new();
                        while let Some(&c) = probe.peek() {
                            if c.is_alphanumeric() || c == '_' {
                                lookahead.push(c);
                                probe.next();
                            } else {
                                break;
                            }
                        }
                        if lookahead == "in" {
                            chars = probe;
                            tokens.push(Token::NotIn);
                        } else {
                            return Err(QueryError::Syntax("'not' must be followed by 'in'".into()));
                        }
                    }
                    "in" => tokens.push(Token::In),
                    _ => tokens.push(Token::Ident(ident)),
                }
            }
            other => {
                return Err(QueryError::Syntax(format!(
                    "unexpected character: {other}"
                )));
            }
        }
    }
    Ok(tokens)
}

/// The evaluator's intermediate value: either a metadata category projected
/// to (sample -> raw value), or a literal operand.
#[derive(Debug, Clone)]
enum Value {
    Series(BTreeMap<String, String>),
    Num(f64),
    Str(String),
    None,
    Tuple(Vec<Value>),
}

#[derive(Debug, Clone, Copy)]
enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

fn to_num(s: &str) -> Option<f64> {
    s.parse().ok()
}

fn apply_num(op: CmpOp, l: f64, r: f64) -> bool {
    match op {
        CmpOp::Eq | CmpOp::Is => l == r,
        CmpOp::NotEq | CmpOp::IsNot => l != r,
        CmpOp::Lt => l < r,
        CmpOp::LtE => l <= r,
        CmpOp::Gt => l > r,
        CmpOp::GtE => l >= r,
        CmpOp::In | CmpOp::NotIn => false,
    }
}

fn apply_str(op: CmpOp, l: &str, r: &str) -> bool {
    match op {
        CmpOp::Eq | CmpOp::Is => l == r,
        CmpOp::NotEq | CmpOp::IsNot => l != r,
        CmpOp::Lt => l < r,
        CmpOp::LtE => l <= r,
        CmpOp::Gt => l > r,
        CmpOp::GtE => l >= r,
        CmpOp::In | CmpOp::NotIn => false,
    }
}

fn compare(op: CmpOp, left: Value, right: Value) -> Result<Value, QueryError> {
    match (op, &right) {
        (CmpOp::Is, Value::None) => {
            return Ok(Value::Series(BTreeMap::new()));
        }
        (CmpOp::IsNot, Value::None) => {
            return match left {
                Value::Series(s) => Ok(Value::Series(s)),
                other => Ok(other),
            };
        }
        _ => {}
    }

    match (op, &left) {
        (CmpOp::In, Value::Series(series)) | (CmpOp::NotIn, Value::Series(series)) => {
            let Value::Tuple(items) = right else {
                return Err(QueryError::Syntax("'in' requires a tuple of literals".into()));
            };
            let wants: Vec<String> = items
                .into_iter()
                .map(|v| match v {
                    Value::Str(s) => s,
                    Value::Num(n) => n.to_string(),
                    _ => String::new(),
                })
                .collect();
            let negate = matches!(op, CmpOp::NotIn);
            return Ok(Value::Series(
                series
                    .iter()
                    .filter(|(_, v)| wants.contains(v) != negate)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ));
        }
        _ => {}
    }

    match (left, right) {
        (Value::Series(l), Value::Series(r)) => {
            let mut out = BTreeMap::new();
            for (k, lv) in &l {
                if let Some((ln, rn)) = r.get(k).and_then(|rv| to_num(lv).zip(to_num(rv)))
                    && apply_num(op, ln, rn)
                {
                    out.insert(k.clone(), lv.clone());
                }
            }
            Ok(Value::Series(out))
        }
        (Value::Series(l), Value::Num(r)) => Ok(Value::Series(
            l.iter()
                .filter_map(|(k, v)| to_num(v).map(|n| (k, v, n)))
                .filter(|(_, _, n)| apply_num(op, *n, r))
                .map(|(k, v, _)| (k.clone(), v.clone()))
                .collect(),
        )),
        (Value::Num(l), Value::Series(r)) => Ok(Value::Series(
            r.iter()
                .filter_map(|(k, v)| to_num(v).map(|n| (k, v, n)))
                .filter(|(_, _, n)| apply_num(op, l, *n))
                .map(|(k, v, _)| (k.clone(), v.clone()))
                .collect(),
        )),
        (Value::Series(l), Value::Str(r)) => Ok(Value::Series(
            l.iter()
                .filter(|(_, v)| apply_str(op, v, &r))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )),
        (Value::Str(l), Value::Series(r)) => Ok(Value::Series(
            r.iter()
                .filter(|(_, v)| apply_str(op, &l, v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )),
        (l, r) => Err(QueryError::Syntax(format!(
            "cannot compare {l:?} and {r:?}"
        ))),
    }
}

fn bool_and(left: Value, right: Value) -> Result<Value, QueryError> {
    match (left, right) {
        (Value::Series(l), Value::Series(r)) => Ok(Value::Series(
            l.into_iter().filter(|(k, _)| r.contains_key(k)).collect(),
        )),
        _ => Err(QueryError::Syntax("'and' requires two predicates".into())),
    }
}

fn bool_or(left: Value, right: Value) -> Result<Value, QueryError> {
    match (left, right) {
        (Value::Series(mut l), Value::Series(r)) => {
            for (k, v) in r {
                l.entry(k).or_insert(v);
            }
            Ok(Value::Series(l))
        }
        _ => Err(QueryError::Syntax("'or' requires two predicates".into())),
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    store: &'a MetadataStore<'a>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn parse_or(&mut self) -> Result<Value, QueryError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.bump();
            let right = self.parse_and()?;
            left = bool_or(left, right)?;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Value, QueryError> {
        let mut left = self.parse_comparison()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.bump();
            let right = self.parse_comparison()?;
            left = bool_and(left, right)?;
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Value, QueryError> {
        let mut left = self.parse_operand()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => CmpOp::Eq,
                Some(Token::NotEq) => CmpOp::NotEq,
                Some(Token::Lt) => CmpOp::Lt,
                Some(Token::LtE) => CmpOp::LtE,
                Some(Token::Gt) => CmpOp::Gt,
                Some(Token::GtE) => CmpOp::GtE,
                Some(Token::In) => CmpOp::In,
                Some(Token::NotIn) => CmpOp::NotIn,
                Some(Token::Is) => CmpOp::Is,
                Some(Token::IsNot) => CmpOp::IsNot,
                _ => break,
            };
            self.bump();
            let right = self.parse_operand()?;
            left = compare(op, left, right)?;
        }
        Ok(left)
    }

    fn parse_operand(&mut self) -> Result<Value, QueryError> {
        match self.bump() {
            Some(Token::LParen) => {
                let first = self.parse_or()?;
                if matches!(self.peek(), Some(Token::Comma)) {
                    let mut items = vec![first];
                    while matches!(self.peek(), Some(Token::Comma)) {
                        self.bump();
                        items.push(self.parse_or()?);
                    }
                    match self.bump() {
                        Some(Token::RParen) => Ok(Value::Tuple(items)),
                        other => Err(QueryError::Syntax(format!(
                            "expected closing paren, found {other:?}"
                        ))),
                    }
                } else {
                    match self.bump() {
                        Some(Token::RParen) => Ok(first),
                        other => Err(QueryError::Syntax(format!(
                            "expected closing paren, found {other:?}"
                        ))),
                    }
                }
            }
            Some(Token::Num(n)) => Ok(Value::Num(n)),
            Some(Token::Str(s)) => Ok(Value::Str(s)),
            Some(Token::Ident(id)) if id == "None" || id == "none" => Ok(Value::None),
            Some(Token::Ident(id)) => {
                let hash = self.store.samples_by_category(&id)?;
                Ok(Value::Series(hash.into_iter().collect()))
            }
            other => Err(QueryError::Syntax(format!(
                "expected an operand, found {other:?}"
            ))),
        }
    }
}

/// Evaluates a predicate, returning the surviving sample ids. `store` backs
/// every bare identifier with its metadata category hash.
pub fn eval(input: &str, store: &MetadataStore<'_>) -> Result<BTreeMap<String, String>, QueryError> {
    if input.trim().is_empty() {
        return Err(QueryError::EmptyQuery);
    }
    let tokens = lex(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        store,
    };
    let result = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(QueryError::Syntax(format!(
            "trailing input after position {}",
            parser.pos
        )));
    }
    match result {
        Value::Series(s) => Ok(s),
        other => Err(QueryError::Syntax(format!(
            "query does not evaluate to a predicate: {other:?}"
        ))),
    }
}
