// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Lexer for selection expressions.
//!
//! Produces words, symbols and quoted strings. Positions are character
//! offsets into the input.

use std::fmt;

/// Characters that end a word in addition to whitespace.
const WORD_BREAK_CHARS: &[char] = &['=', '!', '(', ')', '&', '|'];

/// Two-character symbols recognised when the second character follows.
const DOUBLE_CHAR_SYMBOLS: &[&str] = &["==", "=~", "!=", "!~", "&&", "||"];

/// Characters that open a quoted string.
const QUOTES: &[char] = &['"', '\'', '/'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Word,
    String,
    Symbol,
}

/// A lexical token.
///
/// Equality compares kind and text only, so tokens can be matched against
/// sentinel operators regardless of where they appeared.
#[derive(Debug, Clone)]
pub struct Token {
    kind: TokenKind,
    text: String,
    pos: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, pos: usize) -> Self {
        Self { kind, text: text.into(), pos }
    }

    /// A token used only for comparison.
    pub fn sentinel(kind: TokenKind, text: &str) -> Self {
        Self::new(kind, text, 0)
    }

    pub fn eof(pos: usize) -> Self {
        Self::new(TokenKind::Eof, "", pos)
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.text == other.text
    }
}

impl Eq for Token {}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.kind, self.text)
    }
}

/// Splits a selection expression into tokens with one token of lookahead.
pub struct Tokenizer {
    input: Vec<char>,
    index: usize,
    lookahead: Option<Token>,
}

impl Tokenizer {
    pub fn new(input: &str) -> Self {
        Self { input: input.chars().collect(), index: 0, lookahead: None }
    }

    /// Peek at the next token without consuming it.
    pub fn look_ahead(&mut self) -> &Token {
        let token = match self.lookahead.take() {
            Some(token) => token,
            None => self.scan(),
        };
        self.lookahead.insert(token)
    }

    /// Consume and return the next token. After the input is exhausted every
    /// call returns an EOF token.
    pub fn next_token(&mut self) -> Token {
        match self.lookahead.take() {
            Some(token) => token,
            None => self.scan(),
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.index).copied()
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.index += 1;
        Some(ch)
    }

    fn skip_blanks(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.index += 1;
        }
    }

    fn scan(&mut self) -> Token {
        self.skip_blanks();
        let pos = self.index;

        let Some(ch) = self.peek_char() else {
            return Token::eof(pos);
        };

        match ch {
            '(' | ')' => {
                self.index += 1;
                Token::new(TokenKind::Symbol, ch.to_string(), pos)
            }
            '&' | '|' | '=' | '!' => {
                self.index += 1;
                let second = self.peek_char();
                for symbol in DOUBLE_CHAR_SYMBOLS {
                    let mut chars = symbol.chars();
                    if chars.next() == Some(ch) && chars.next() == second {
                        self.index += 1;
                        return Token::new(TokenKind::Symbol, *symbol, pos);
                    }
                }
                Token::new(TokenKind::Symbol, ch.to_string(), pos)
            }
            _ if QUOTES.contains(&ch) => self.scan_string(pos),
            _ => self.scan_word(pos),
        }
    }

    fn scan_word(&mut self, pos: usize) -> Token {
        let mut text = String::new();
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() || WORD_BREAK_CHARS.contains(&ch) {
                break;
            }
            text.push(ch);
            self.index += 1;
        }
        Token::new(TokenKind::Word, text, pos)
    }

    /// A backslash escapes whatever follows it, and a lone backslash at end
    /// of input is kept. The string ends at the matching unescaped quote or
    /// at end of input.
    fn scan_string(&mut self, pos: usize) -> Token {
        let mut text = String::new();
        let quote = self.next_char();
        while let Some(ch) = self.next_char() {
            if ch == '\\' {
                match self.next_char() {
                    Some(escaped) => text.push(escaped),
                    None => text.push('\\'),
                }
            } else if Some(ch) == quote {
                break;
            } else {
                text.push(ch);
            }
        }
        Token::new(TokenKind::String, text, pos)
    }
}

#[cfg(test)]
#[path = "tokenizer_tests.rs"]
mod tests;
