// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Helpers for the tagged-text formats exchanged with drivers.
//!
//! The engine never parses result fragments beyond the attributes of their
//! root element, so this module only reads start tags and writes elements.
//! Emitted attributes are single-quoted.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Root start tag of a fragment, optionally preceded by an XML declaration.
#[allow(clippy::expect_used)]
static START_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\s*(?:<\?[^>]*\?>\s*)?<([A-Za-z_][\w.:-]*)((?:\s+[A-Za-z_][\w.:-]*\s*=\s*(?:'[^']*'|"[^"]*"))*)\s*/?>"#,
    )
    .expect("valid regex pattern")
});

#[allow(clippy::expect_used)]
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][\w.:-]*)\s*=\s*(?:'([^']*)'|"([^"]*)")"#)
        .expect("valid regex pattern")
});

/// Escape the five XML special characters.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Reverse of [`escape`].
pub fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Wrap text in a CDATA section, splitting any embedded terminator.
pub fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

/// The root start tag of a fragment: element name plus attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    name: String,
    attributes: Vec<(String, String)>,
}

impl StartTag {
    /// Read the root start tag of `fragment`.
    ///
    /// Returns `None` when the fragment does not begin with an element.
    pub fn parse(fragment: &str) -> Option<Self> {
        let caps = START_TAG.captures(fragment)?;
        let name = caps.get(1)?.as_str().to_string();
        let attributes = caps
            .get(2)
            .map(|raw| {
                ATTRIBUTE
                    .captures_iter(raw.as_str())
                    .filter_map(|attr| {
                        let key = attr.get(1)?.as_str().to_string();
                        let value = attr.get(2).or_else(|| attr.get(3))?.as_str();
                        Some((key, unescape(value)))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Some(Self { name, attributes })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Integer attribute, or 0 when missing or malformed.
    pub fn count(&self, key: &str) -> u64 {
        self.attribute(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }
}

/// Builder for a single element with escaped, single-quoted attributes.
#[derive(Debug, Clone, Default)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<String>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.attributes.push((key.into(), value.to_string()));
        self
    }

    /// Add the attribute only when a non-empty value is present.
    pub fn attr_opt(self, key: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => self.attr(key, v),
            _ => self,
        }
    }

    /// Append pre-rendered markup as a child.
    pub fn child(mut self, markup: impl Into<String>) -> Self {
        self.children.push(markup.into());
        self
    }

    pub fn children<I, S>(mut self, markup: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children.extend(markup.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (key, value) in &self.attributes {
            write!(f, " {}='{}'", key, escape(value))?;
        }
        if self.children.is_empty() {
            return write!(f, " />");
        }
        write!(f, ">")?;
        for child in &self.children {
            f.write_str(child)?;
        }
        write!(f, "</{}>", self.name)
    }
}

#[cfg(test)]
#[path = "xml_tests.rs"]
mod tests;
