// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Test selection language.
//!
//! Compiles expressions such as `cat==Urgent && test=~/Parser/` into the
//! filter element tree understood by framework drivers.

pub mod parser;
pub mod tokenizer;

pub use parser::{SelectionError, TestSelectionParser};
pub use tokenizer::{Token, TokenKind, Tokenizer};
