// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Runner that delegates to a remote agent.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::agent::{AgentProvider, TestAgent};
use crate::driver::SharedListener;
use crate::error::{EngineError, Result};
use crate::filter::TestFilter;
use crate::package::TestPackage;
use crate::result::TestEngineResult;
use crate::xml::{self, Element};

use super::TestEngineRunner;

#[derive(Clone)]
struct Remote {
    agent: Arc<dyn TestAgent>,
    runner: Arc<dyn TestEngineRunner>,
}

/// Acquires an agent on first use and forwards every call to its runner.
pub struct ProcessRunner {
    package: TestPackage,
    provider: Arc<dyn AgentProvider>,
    /// Only ever held briefly, so stops never wait on agent acquisition.
    remote: Mutex<Option<Remote>>,
    /// Serializes acquisition so concurrent first calls launch one agent.
    acquiring: Mutex<()>,
}

impl ProcessRunner {
    pub fn new(package: TestPackage, provider: Arc<dyn AgentProvider>) -> Self {
        Self { package, provider, remote: Mutex::new(None), acquiring: Mutex::new(()) }
    }

    pub fn has_agent(&self) -> bool {
        self.remote.lock().is_some()
    }

    fn remote(&self) -> Result<Remote> {
        if let Some(remote) = self.remote.lock().clone() {
            return Ok(remote);
        }
        let _acquiring = self.acquiring.lock();
        if let Some(remote) = self.remote.lock().clone() {
            return Ok(remote);
        }

        let agent = self.provider.get_agent(&self.package)?;
        let runner = agent
            .create_runner(&self.package)
            .map_err(|e| EngineError::wrap("Unable to create a runner in the remote agent", e))?;
        tracing::debug!("package {} assigned to agent {}", self.package.id(), agent.id());
        let remote = Remote { agent, runner };
        *self.remote.lock() = Some(remote.clone());
        Ok(remote)
    }

    /// Result reported in place of a run that failed remotely.
    fn failed_run(&self, err: &EngineError) -> TestEngineResult {
        let mut suite = Element::new("test-suite")
            .attr("type", "Assembly")
            .attr("id", self.package.id())
            .attr_opt("name", self.package.name())
            .attr_opt("fullname", self.package.full_name())
            .attr("runstate", "Runnable")
            .attr("testcasecount", 0)
            .attr("result", "Failed")
            .attr("label", "Error");
        for key in ["total", "passed", "failed", "warnings", "inconclusive", "skipped", "asserts"] {
            suite = suite.attr(key, 0);
        }
        let message = format!("<failure><message>{}</message></failure>", xml::cdata(&err.to_string()));
        TestEngineResult::new(suite.child(message).to_string())
    }
}

impl TestEngineRunner for ProcessRunner {
    fn load(&self) -> Result<TestEngineResult> {
        self.remote()?.runner.load()
    }

    fn unload(&self) -> Result<()> {
        let Some(remote) = self.remote.lock().take() else {
            return Ok(());
        };
        let outcome = remote.runner.unload();
        self.provider.release_agent(remote.agent.as_ref());
        tracing::debug!("released agent {}", remote.agent.id());
        outcome
    }

    fn count_test_cases(&self, filter: &TestFilter) -> Result<usize> {
        self.remote()?.runner.count_test_cases(filter)
    }

    fn run(&self, listener: SharedListener, filter: &TestFilter) -> Result<TestEngineResult> {
        let outcome = self.remote().and_then(|remote| remote.runner.run(listener, filter));
        match outcome {
            Ok(result) => Ok(result),
            Err(err) => {
                tracing::warn!("remote run of package {} failed: {}", self.package.id(), err);
                Ok(self.failed_run(&err))
            }
        }
    }

    fn explore(&self, filter: &TestFilter) -> Result<TestEngineResult> {
        self.remote()?.runner.explore(filter)
    }

    fn stop_run(&self, force: bool) {
        let remote = self.remote.lock().clone();
        if let Some(remote) = remote {
            remote.runner.stop_run(force);
        }
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
