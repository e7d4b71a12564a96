// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine results.
//!
//! A result is an ordered list of fragments, one per loaded unit. Runners
//! concatenate fragments from their children and occasionally wrap them in a
//! summary node. Only root attributes of fragments are ever read.

use std::fmt;

use crate::error::{EngineError, Result};
use crate::package::TestPackage;
use crate::xml::{Element, StartTag};

/// Counters summed by [`TestEngineResult::aggregate`].
const SUMMED_COUNTS: &[&str] =
    &["total", "passed", "failed", "warnings", "inconclusive", "skipped", "asserts"];

/// An ordered set of result fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestEngineResult {
    fragments: Vec<String>,
}

impl TestEngineResult {
    pub fn new(fragment: impl Into<String>) -> Self {
        Self { fragments: vec![fragment.into()] }
    }

    pub fn from_fragments(fragments: Vec<String>) -> Self {
        Self { fragments }
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn into_fragments(self) -> Vec<String> {
        self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// The only fragment, when there is exactly one.
    pub fn as_single(&self) -> Option<&str> {
        match self.fragments.as_slice() {
            [single] => Some(single),
            _ => None,
        }
    }

    pub fn push(&mut self, fragment: impl Into<String>) {
        self.fragments.push(fragment.into());
    }

    /// Concatenate results, preserving their order.
    pub fn merge<I>(results: I) -> Self
    where
        I: IntoIterator<Item = TestEngineResult>,
    {
        Self { fragments: results.into_iter().flat_map(|r| r.fragments).collect() }
    }

    /// Wrap every fragment in one summary node.
    ///
    /// `testcasecount` is always summed. When any child carries a `result`,
    /// the node also gets the overall result, the label and site of the first
    /// failing child, and the summed counters.
    pub fn aggregate(
        &self,
        element: &str,
        suite_type: Option<&str>,
        id: impl fmt::Display,
        name: Option<&str>,
        full_name: Option<&str>,
    ) -> Self {
        let node = self.summary_node(element, suite_type, id, name, full_name);
        Self::new(node.children(self.fragments.iter().cloned()).to_string())
    }

    /// The summary node of [`aggregate`](Self::aggregate), without children.
    pub(crate) fn summary_node(
        &self,
        element: &str,
        suite_type: Option<&str>,
        id: impl fmt::Display,
        name: Option<&str>,
        full_name: Option<&str>,
    ) -> Element {
        let tags: Vec<StartTag> = self.fragments.iter().filter_map(|f| StartTag::parse(f)).collect();

        let mut node = Element::new(element)
            .attr_opt("type", suite_type)
            .attr("id", id)
            .attr_opt("name", name)
            .attr_opt("fullname", full_name)
            .attr("runstate", "Runnable")
            .attr("testcasecount", tags.iter().map(|t| t.count("testcasecount")).sum::<u64>());

        if let Some(outcome) = overall_result(&tags) {
            node = node.attr("result", outcome);
            let first_failure = tags.iter().find(|t| t.attribute("result") == Some("Failed"));
            if let Some(failure) = first_failure {
                node = node
                    .attr_opt("label", failure.attribute("label"))
                    .attr_opt("site", failure.attribute("site"));
            }
            for key in SUMMED_COUNTS {
                node = node.attr(*key, tags.iter().map(|t| t.count(key)).sum::<u64>());
            }
        }
        node
    }
}

impl fmt::Display for TestEngineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fragment in &self.fragments {
            f.write_str(fragment)?;
        }
        Ok(())
    }
}

/// Rank of a result value; higher wins when aggregating.
fn result_rank(result: &str) -> Option<u8> {
    match result {
        "Inconclusive" => Some(0),
        "Skipped" => Some(1),
        "Passed" => Some(2),
        "Warning" => Some(3),
        "Failed" => Some(4),
        _ => None,
    }
}

fn overall_result(tags: &[StartTag]) -> Option<&str> {
    tags.iter()
        .filter_map(|t| t.attribute("result"))
        .filter_map(|r| result_rank(r).map(|rank| (rank, r)))
        .max_by_key(|(rank, _)| *rank)
        .map(|(_, r)| r)
}

/// Rebuild project grouping lost when a package tree is flattened to leaves.
///
/// Relies on fragment order matching the depth-first order of leaf packages.
/// Each project sub-package consumes as many fragments as it has leaves and
/// wraps them in a `Project` suite; any other sub-package consumes one.
pub fn regroup_projects(result: TestEngineResult, package: &TestPackage) -> Result<TestEngineResult> {
    if !package.has_nested_packages() {
        return Ok(result);
    }

    let expected = package.leaf_count();
    if result.len() != expected {
        return Err(EngineError::Engine(format!(
            "expected {} result fragments for package {}, got {}",
            expected,
            package.id(),
            result.len()
        )));
    }

    let mut remaining = result.into_fragments().into_iter();
    let mut grouped = TestEngineResult::default();
    for sub in package.sub_packages() {
        if sub.has_sub_packages() {
            let fragments: Vec<String> = remaining.by_ref().take(sub.leaf_count()).collect();
            let project = TestEngineResult::from_fragments(fragments).aggregate(
                "test-suite",
                Some("Project"),
                sub.id(),
                sub.name(),
                sub.full_name(),
            );
            grouped.fragments.extend(project.fragments);
        } else if let Some(fragment) = remaining.next() {
            grouped.push(fragment);
        }
    }
    Ok(grouped)
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;
