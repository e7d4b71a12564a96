// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine runners.
//!
//! A runner loads, explores, counts and runs the tests of one package. The
//! factory picks a topology for a package; aggregating runners fan out to one
//! child per leaf package and merge the children's results in order.

pub mod aggregate;
pub mod direct;
pub mod factory;
pub mod master;
pub mod not_runnable;
pub mod process;

use std::sync::Arc;
use std::time::Duration;

use crate::agent::AgentProvider;
use crate::driver::{DriverService, SharedListener};
use crate::error::Result;
use crate::filter::TestFilter;
use crate::result::TestEngineResult;

pub use aggregate::AggregatingRunner;
pub use direct::{DirectRunner, Isolation};
pub use factory::{ChildFactory, ChildRunner, RunnerFactory, RunnerTopology, select_topology};
pub use master::{MasterRunner, TestRun};
pub use not_runnable::NotRunnableRunner;
pub use process::ProcessRunner;

/// Operations every runner supports.
///
/// Runners are shared across threads: `stop_run` is called while `run` is in
/// progress on another thread.
pub trait TestEngineRunner: Send + Sync {
    fn load(&self) -> Result<TestEngineResult>;

    fn unload(&self) -> Result<()>;

    fn reload(&self) -> Result<TestEngineResult> {
        self.unload()?;
        self.load()
    }

    fn count_test_cases(&self, filter: &TestFilter) -> Result<usize>;

    fn run(&self, listener: SharedListener, filter: &TestFilter) -> Result<TestEngineResult>;

    fn explore(&self, filter: &TestFilter) -> Result<TestEngineResult>;

    /// Ask a run in progress to stop. Failures are logged, never returned.
    fn stop_run(&self, force: bool);

    /// Release everything the runner holds.
    fn dispose(&self) -> Result<()> {
        self.unload()
    }
}

/// Services and limits shared by the runners of one engine.
#[derive(Clone)]
pub struct RunnerContext {
    pub driver_service: Arc<dyn DriverService>,
    pub agent_provider: Arc<dyn AgentProvider>,
    /// How long a forced stop waits for running tests to finish.
    pub stop_timeout: Duration,
    pub processor_count: usize,
}
