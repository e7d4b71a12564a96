// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The test engine.
//!
//! Owns configuration, package ids, project expansion and the runner factory.
//! Packages are prepared single-threaded here before any runner sees them.

use std::sync::Arc;
use std::thread;

use crate::agent::{Agency, AgentLauncher, AgentProvider};
use crate::config::EngineConfig;
use crate::driver::DriverService;
use crate::error::Result;
use crate::package::{PackageIds, TestPackage};
use crate::project::ProjectService;
use crate::runner::{MasterRunner, RunnerContext, RunnerFactory, RunnerTopology};

pub struct TestEngine {
    config: EngineConfig,
    ids: PackageIds,
    projects: ProjectService,
    factory: RunnerFactory,
}

impl TestEngine {
    pub fn new(
        config: EngineConfig,
        driver_service: Arc<dyn DriverService>,
        agent_provider: Arc<dyn AgentProvider>,
    ) -> Self {
        let processor_count = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let context = RunnerContext {
            driver_service,
            agent_provider,
            stop_timeout: config.stop_timeout(),
            processor_count,
        };
        Self {
            config,
            ids: PackageIds::new(),
            projects: ProjectService::with_defaults(),
            factory: RunnerFactory::new(context),
        }
    }

    /// An engine whose agents come from an [`Agency`] over `launcher`.
    pub fn with_launcher(
        config: EngineConfig,
        driver_service: Arc<dyn DriverService>,
        launcher: Arc<dyn AgentLauncher>,
    ) -> Self {
        let agency = Arc::new(Agency::new(launcher, config.agents.timing()));
        Self::new(config, driver_service, agency)
    }

    /// Replace the project loaders.
    pub fn with_projects(mut self, projects: ProjectService) -> Self {
        self.projects = projects;
        self
    }

    /// Override the processor count used to size agent pools.
    pub fn with_processor_count(mut self, processor_count: usize) -> Self {
        let context = RunnerContext { processor_count, ..self.factory.context().clone() };
        self.factory = RunnerFactory::new(context);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A root package with one sub-package per file.
    pub fn create_package<I, S>(&self, files: I) -> Result<TestPackage>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TestPackage::from_files(&self.ids, files)
    }

    /// Apply configured defaults and expand projects.
    pub fn prepare(&self, package: &mut TestPackage) -> Result<()> {
        self.config.apply_to(package);
        self.projects.expand_projects(package, &self.ids)
    }

    pub fn select_topology(&self, package: &TestPackage) -> RunnerTopology {
        self.factory.topology(package)
    }

    /// Prepare `package` and create the runner callers drive.
    pub fn get_runner(&self, mut package: TestPackage) -> Result<Arc<MasterRunner>> {
        self.prepare(&mut package)?;
        tracing::debug!(
            "package {} has {} assemblies; topology {}",
            package.id(),
            package.leaf_count(),
            self.select_topology(&package)
        );
        Ok(Arc::new(MasterRunner::new(package, self.factory.clone())?))
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
