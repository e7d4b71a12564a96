// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Test filters and the builder that combines name lists with a where-clause.

use std::fmt;

use crate::selection::{SelectionError, TestSelectionParser};
use crate::xml;

/// An immutable, serialized filter expression passed to drivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFilter {
    text: String,
}

impl TestFilter {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The filter that selects every test.
    pub fn empty() -> Self {
        Self::new("<filter/>")
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// True when the filter has no criteria.
    pub fn is_empty(&self) -> bool {
        matches!(self.text.trim(), "<filter/>" | "<filter />" | "<filter></filter>")
    }
}

impl Default for TestFilter {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for TestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Accumulates test names and a where-clause into one [`TestFilter`].
///
/// Names are OR-combined. The where-clause further narrows them: its element
/// is a sibling of the names inside `<filter>`, which drivers treat as AND.
#[derive(Debug, Default)]
pub struct TestFilterBuilder {
    tests: Vec<String>,
    where_clause: Option<String>,
}

impl TestFilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a test by its exact full name.
    pub fn add_test(&mut self, full_name: impl Into<String>) -> &mut Self {
        self.tests.push(full_name.into());
        self
    }

    /// Narrow the selection with an expression, replacing any earlier one.
    ///
    /// The expression is parsed immediately so errors surface here.
    pub fn select_where(&mut self, expression: &str) -> Result<&mut Self, SelectionError> {
        self.where_clause = Some(TestSelectionParser::parse(expression)?);
        Ok(self)
    }

    pub fn build(&self) -> TestFilter {
        let mut text = String::from("<filter>");

        if self.tests.len() > 1 {
            text.push_str("<or>");
        }
        for test in &self.tests {
            text.push_str(&format!("<test>{}</test>", xml::escape(test)));
        }
        if self.tests.len() > 1 {
            text.push_str("</or>");
        }

        if let Some(clause) = &self.where_clause {
            text.push_str(clause);
        }

        text.push_str("</filter>");
        TestFilter::new(text)
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
