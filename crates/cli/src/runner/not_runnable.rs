// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Runner for packages the engine cannot execute.
//!
//! Never touches a driver or the filter: every operation reports the same
//! fixed reason.

use crate::driver::SharedListener;
use crate::error::Result;
use crate::filter::TestFilter;
use crate::package::TestPackage;
use crate::result::TestEngineResult;
use crate::xml::{self, Element};

use super::TestEngineRunner;

pub const UNMANAGED_MESSAGE: &str = "Unmanaged libraries or applications are not supported";

/// Fragment describing `package` as a non-runnable assembly.
///
/// Run fragments also carry a failed result and zero counts.
pub fn not_runnable_fragment(package: &TestPackage, message: &str, with_result: bool) -> String {
    let mut suite = Element::new("test-suite")
        .attr("type", "Assembly")
        .attr("id", package.id())
        .attr_opt("name", package.name())
        .attr_opt("fullname", package.full_name())
        .attr("runstate", "NotRunnable")
        .attr("testcasecount", 0);

    if with_result {
        suite = suite.attr("result", "Failed").attr("label", "Invalid");
        for key in ["total", "passed", "failed", "warnings", "inconclusive", "skipped", "asserts"] {
            suite = suite.attr(key, 0);
        }
    }

    let property = Element::new("property").attr("name", "_SKIPREASON").attr("value", message);
    suite = suite.child(Element::new("properties").child(property.to_string()).to_string());
    if with_result {
        suite = suite.child(format!("<reason><message>{}</message></reason>", xml::cdata(message)));
    }
    suite.to_string()
}

pub struct NotRunnableRunner {
    package: TestPackage,
    message: String,
}

impl NotRunnableRunner {
    pub fn new(package: TestPackage) -> Self {
        Self::with_message(package, UNMANAGED_MESSAGE)
    }

    pub fn with_message(package: TestPackage, message: impl Into<String>) -> Self {
        Self { package, message: message.into() }
    }

    fn result(&self, with_result: bool) -> TestEngineResult {
        TestEngineResult::from_fragments(
            self.package
                .leaves()
                .into_iter()
                .map(|leaf| not_runnable_fragment(leaf, &self.message, with_result))
                .collect(),
        )
    }
}

impl TestEngineRunner for NotRunnableRunner {
    fn load(&self) -> Result<TestEngineResult> {
        Ok(self.result(false))
    }

    fn unload(&self) -> Result<()> {
        Ok(())
    }

    fn count_test_cases(&self, _filter: &TestFilter) -> Result<usize> {
        Ok(0)
    }

    fn run(&self, _listener: SharedListener, _filter: &TestFilter) -> Result<TestEngineResult> {
        Ok(self.result(true))
    }

    fn explore(&self, _filter: &TestFilter) -> Result<TestEngineResult> {
        Ok(self.result(false))
    }

    fn stop_run(&self, _force: bool) {}
}

#[cfg(test)]
#[path = "not_runnable_tests.rs"]
mod tests;
