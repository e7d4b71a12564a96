// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Recursive-descent parser for selection expressions.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! Expr    := Term (OR Term)*
//! Term    := Element (AND Element)*
//! Element := '(' Expr ')' | '!' '(' Expr ')' | '!' Element | Field Op Value
//! ```
//!
//! The output is the body of a `<filter>` element.

use thiserror::Error;

use super::tokenizer::{Token, TokenKind, Tokenizer};
use crate::xml;

type Op = (TokenKind, &'static str);

const LPAREN: Op = (TokenKind::Symbol, "(");
const RPAREN: Op = (TokenKind::Symbol, ")");
const NOT_OP: Op = (TokenKind::Symbol, "!");

const AND_OPS: &[Op] = &[
    (TokenKind::Symbol, "&"),
    (TokenKind::Symbol, "&&"),
    (TokenKind::Word, "and"),
    (TokenKind::Word, "AND"),
];

const OR_OPS: &[Op] = &[
    (TokenKind::Symbol, "|"),
    (TokenKind::Symbol, "||"),
    (TokenKind::Word, "or"),
    (TokenKind::Word, "OR"),
];

const REL_OPS: &[Op] = &[
    (TokenKind::Symbol, "="),
    (TokenKind::Symbol, "=="),
    (TokenKind::Symbol, "!="),
    (TokenKind::Symbol, "=~"),
    (TokenKind::Symbol, "!~"),
];

/// Fields with a dedicated filter element.
const FIELDS: &[&str] = &["test", "cat", "method", "class", "name", "namespace", "partition", "id"];

/// A selection expression could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("No input provided for test selection.")]
    Empty,

    #[error("Unexpected token '{text}' at position {position} in selection expression.")]
    UnexpectedToken { text: String, position: usize },
}

impl SelectionError {
    fn unexpected(token: &Token) -> Self {
        Self::UnexpectedToken { text: token.text().to_string(), position: token.pos() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Equal,
    NotEqual,
    Match,
    NoMatch,
}

impl Operator {
    fn from_token(token: &Token) -> Self {
        match token.text() {
            "!=" => Self::NotEqual,
            "=~" => Self::Match,
            "!~" => Self::NoMatch,
            _ => Self::Equal,
        }
    }

    fn is_regex(self) -> bool {
        matches!(self, Self::Match | Self::NoMatch)
    }

    fn is_negated(self) -> bool {
        matches!(self, Self::NotEqual | Self::NoMatch)
    }
}

/// Parses selection expressions into filter element text.
pub struct TestSelectionParser {
    tokenizer: Tokenizer,
}

impl TestSelectionParser {
    /// Parse `input`, returning the filter elements it selects.
    ///
    /// `cat==Urgent` yields `<cat>Urgent</cat>`.
    pub fn parse(input: &str) -> Result<String, SelectionError> {
        let mut parser = Self { tokenizer: Tokenizer::new(input) };

        if parser.tokenizer.look_ahead().kind() == TokenKind::Eof {
            return Err(SelectionError::Empty);
        }

        let result = parser.parse_expression()?;

        let trailing = parser.tokenizer.next_token();
        if trailing.kind() != TokenKind::Eof {
            return Err(SelectionError::unexpected(&trailing));
        }
        Ok(result)
    }

    fn parse_expression(&mut self) -> Result<String, SelectionError> {
        let mut terms = vec![self.parse_term()?];
        while self.looking_at(OR_OPS) {
            self.tokenizer.next_token();
            terms.push(self.parse_term()?);
        }
        Ok(combine("or", terms))
    }

    fn parse_term(&mut self) -> Result<String, SelectionError> {
        let mut elements = vec![self.parse_element()?];
        while self.looking_at(AND_OPS) {
            self.tokenizer.next_token();
            elements.push(self.parse_element()?);
        }
        Ok(combine("and", elements))
    }

    fn parse_element(&mut self) -> Result<String, SelectionError> {
        if self.looking_at(&[LPAREN]) {
            self.tokenizer.next_token();
            return self.parse_parenthesized();
        }

        if self.looking_at(&[NOT_OP]) {
            self.tokenizer.next_token();
            let negated = if self.looking_at(&[LPAREN]) {
                self.tokenizer.next_token();
                self.parse_parenthesized()?
            } else {
                self.parse_element()?
            };
            return Ok(format!("<not>{}</not>", negated));
        }

        let lhs = self.expect_kind(&[TokenKind::Word])?;
        let op = Operator::from_token(&self.expect(REL_OPS)?);

        let field = lhs.text();
        if field == "test" {
            let value = if op.is_regex() {
                self.expect_kind(&[TokenKind::String, TokenKind::Word])?.text().to_string()
            } else {
                self.parse_test_name()?
            };
            return Ok(emit(field, field, op, &value));
        }

        let value = self.expect_kind(&[TokenKind::String, TokenKind::Word])?;
        if FIELDS.contains(&field) {
            Ok(emit(field, field, op, value.text()))
        } else {
            let open = format!("prop name='{}'", xml::escape(field));
            Ok(emit(&open, "prop", op, value.text()))
        }
    }

    /// Parse the remainder of a group whose `(` was already consumed.
    fn parse_parenthesized(&mut self) -> Result<String, SelectionError> {
        let inner = self.parse_expression()?;
        self.expect(&[RPAREN])?;
        Ok(inner)
    }

    /// Rebuild a test name whose quotes may have been stripped by a shell.
    ///
    /// `Ns.Class.Method("a",1)` arrives as a word followed by a parenthesised
    /// run of tokens. Tokens are swallowed while parentheses are open; string
    /// tokens get their quotes back. Outside parentheses only `(` or a word
    /// directly touching the previous token continues the name.
    fn parse_test_name(&mut self) -> Result<String, SelectionError> {
        let first = self.expect_kind(&[TokenKind::String, TokenKind::Word])?;
        if first.kind() == TokenKind::String {
            return Ok(first.text().to_string());
        }

        let mut name = first.text().to_string();
        let mut end = token_end(&first);
        let mut depth = 0usize;
        loop {
            let next = self.tokenizer.look_ahead().clone();
            match next.kind() {
                TokenKind::Eof => break,
                TokenKind::Symbol if next.text() == "(" => {
                    depth += 1;
                    name.push('(');
                }
                TokenKind::Symbol if next.text() == ")" => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    name.push(')');
                }
                TokenKind::Word if depth == 0 && Some(next.pos()) == end => {
                    name.push_str(next.text());
                }
                _ if depth == 0 => break,
                TokenKind::String => {
                    name.push('"');
                    name.push_str(next.text());
                    name.push('"');
                }
                _ => name.push_str(next.text()),
            }
            end = token_end(&next);
            self.tokenizer.next_token();
        }
        Ok(name)
    }

    fn looking_at(&mut self, ops: &[Op]) -> bool {
        let ahead = self.tokenizer.look_ahead();
        ops.iter().any(|(kind, text)| ahead.is(*kind, text))
    }

    fn expect(&mut self, ops: &[Op]) -> Result<Token, SelectionError> {
        let token = self.tokenizer.next_token();
        if ops.iter().any(|(kind, text)| token.is(*kind, text)) {
            Ok(token)
        } else {
            Err(SelectionError::unexpected(&token))
        }
    }

    fn expect_kind(&mut self, kinds: &[TokenKind]) -> Result<Token, SelectionError> {
        let token = self.tokenizer.next_token();
        if kinds.contains(&token.kind()) {
            Ok(token)
        } else {
            Err(SelectionError::unexpected(&token))
        }
    }
}

/// Offset just past a token, when it can be known from its text.
fn token_end(token: &Token) -> Option<usize> {
    match token.kind() {
        TokenKind::Word | TokenKind::Symbol => Some(token.pos() + token.text().chars().count()),
        TokenKind::String | TokenKind::Eof => None,
    }
}

fn combine(tag: &str, parts: Vec<String>) -> String {
    if parts.len() == 1 {
        return parts.concat();
    }
    format!("<{tag}>{}</{tag}>", parts.concat())
}

fn emit(open: &str, close: &str, op: Operator, value: &str) -> String {
    let regex = if op.is_regex() { " re='1'" } else { "" };
    let element = format!("<{open}{regex}>{}</{close}>", xml::escape(value));
    if op.is_negated() { format!("<not>{element}</not>") } else { element }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
