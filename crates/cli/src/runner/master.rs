// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The caller-facing runner.
//!
//! Wraps the engine runner chosen by the factory, restores project grouping,
//! and reports everything inside a single `test-run` node.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;

use crate::driver::SharedListener;
use crate::error::{EngineError, Result};
use crate::filter::TestFilter;
use crate::package::TestPackage;
use crate::result::{TestEngineResult, regroup_projects};
use crate::xml::Element;

use super::TestEngineRunner;
use super::factory::{RunnerFactory, RunnerTopology};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Timestamp format of `start-time` and `end-time`.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%SZ";

pub struct MasterRunner {
    package: TestPackage,
    factory: RunnerFactory,
    engine_runner: Mutex<Option<Arc<dyn TestEngineRunner>>>,
}

impl MasterRunner {
    /// Fails when the package names no test file.
    pub fn new(package: TestPackage, factory: RunnerFactory) -> Result<Self> {
        if package.leaves().iter().all(|leaf| leaf.full_name().is_none()) {
            return Err(EngineError::invalid_argument("package", "package contains no test files"));
        }
        Ok(Self { package, factory, engine_runner: Mutex::new(None) })
    }

    pub fn package(&self) -> &TestPackage {
        &self.package
    }

    pub fn topology(&self) -> RunnerTopology {
        self.factory.topology(&self.package)
    }

    fn engine_runner(&self) -> Arc<dyn TestEngineRunner> {
        let mut slot = self.engine_runner.lock();
        if let Some(runner) = slot.as_ref() {
            return Arc::clone(runner);
        }
        let runner = self.factory.make_runner(&self.package);
        *slot = Some(Arc::clone(&runner));
        runner
    }

    fn test_run_node(&self, result: &TestEngineResult) -> Element {
        result.summary_node("test-run", None, self.package.id(), self.package.name(), self.package.full_name())
    }

    fn wrap(&self, result: TestEngineResult) -> Result<TestEngineResult> {
        let result = regroup_projects(result, &self.package)?;
        let node = self.test_run_node(&result).children(result.into_fragments());
        Ok(TestEngineResult::new(node.to_string()))
    }

    /// Ask a run in progress to wind down.
    pub fn request_stop(&self) {
        self.stop_run(false);
    }

    /// Cancel a run in progress; returns once nothing is left running.
    pub fn force_stop(&self) {
        self.stop_run(true);
    }

    /// Start a run on a background thread.
    pub fn run_async(self: &Arc<Self>, listener: SharedListener, filter: TestFilter) -> TestRun {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let runner = Arc::clone(self);
        let spawned = thread::Builder::new().name("corral-run".to_string()).spawn(move || {
            // The handle may have been dropped; the result goes nowhere then.
            let _ = tx.send(runner.run(listener, &filter));
        });
        let outcome = spawned
            .err()
            .map(|e| Err(EngineError::Engine(format!("failed to start test run thread: {}", e))));
        TestRun { rx, outcome }
    }
}

impl TestEngineRunner for MasterRunner {
    fn load(&self) -> Result<TestEngineResult> {
        tracing::info!("loading package {}", self.package.id());
        self.wrap(self.engine_runner().load()?)
    }

    fn unload(&self) -> Result<()> {
        let runner = self.engine_runner.lock().clone();
        match runner {
            Some(runner) => {
                tracing::info!("unloading package {}", self.package.id());
                runner.unload()
            }
            None => Ok(()),
        }
    }

    fn count_test_cases(&self, filter: &TestFilter) -> Result<usize> {
        self.engine_runner().count_test_cases(filter)
    }

    fn run(&self, listener: SharedListener, filter: &TestFilter) -> Result<TestEngineResult> {
        let runner = self.engine_runner();
        let count = runner.count_test_cases(filter)?;

        let start_time = Utc::now();
        let started = Instant::now();
        let start_run = Element::new("start-run")
            .attr("count", count)
            .attr("start-time", start_time.format(TIME_FORMAT))
            .attr("engine-version", ENGINE_VERSION);
        listener.on_test_event(&start_run.to_string());
        tracing::info!("running {} test cases from package {}", count, self.package.id());

        let result = regroup_projects(runner.run(Arc::clone(&listener), filter)?, &self.package)?;

        let test_run = self
            .test_run_node(&result)
            .attr("engine-version", ENGINE_VERSION)
            .attr("start-time", start_time.format(TIME_FORMAT))
            .attr("end-time", Utc::now().format(TIME_FORMAT))
            .attr("duration", format!("{:.6}", started.elapsed().as_secs_f64()))
            .child(filter.text())
            .children(result.into_fragments())
            .to_string();
        listener.on_test_event(&test_run);
        tracing::info!("run of package {} finished", self.package.id());
        Ok(TestEngineResult::new(test_run))
    }

    fn explore(&self, filter: &TestFilter) -> Result<TestEngineResult> {
        self.wrap(self.engine_runner().explore(filter)?)
    }

    fn stop_run(&self, force: bool) {
        let runner = self.engine_runner.lock().clone();
        if let Some(runner) = runner {
            tracing::info!("stopping run of package {} (force: {})", self.package.id(), force);
            runner.stop_run(force);
        }
    }

    fn dispose(&self) -> Result<()> {
        let runner = self.engine_runner.lock().take();
        match runner {
            Some(runner) => runner.dispose(),
            None => Ok(()),
        }
    }
}

/// Handle to a run started by [`MasterRunner::run_async`].
pub struct TestRun {
    rx: Receiver<Result<TestEngineResult>>,
    outcome: Option<Result<TestEngineResult>>,
}

impl TestRun {
    /// Wait up to `timeout` for the run to finish. Returns true once it has.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        if self.outcome.is_some() {
            return true;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => {
                self.outcome = Some(outcome);
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                self.outcome = Some(Err(run_thread_lost()));
                true
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    /// Block until the run finishes and return its result.
    pub fn into_result(mut self) -> Result<TestEngineResult> {
        match self.outcome.take() {
            Some(outcome) => outcome,
            None => self.rx.recv().unwrap_or_else(|_| Err(run_thread_lost())),
        }
    }
}

fn run_thread_lost() -> EngineError {
    EngineError::Engine("test run ended without reporting a result".to_string())
}

#[cfg(test)]
#[path = "master_tests.rs"]
mod tests;
