// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Aggregating runner.
//!
//! Fans out to one child runner per leaf package. Runs may execute children
//! on a bounded pool, but results are always merged in child order.

use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::driver::SharedListener;
use crate::error::{EngineError, Result};
use crate::filter::TestFilter;
use crate::package::{TestPackage, keys};
use crate::result::TestEngineResult;

use super::TestEngineRunner;
use super::factory::ChildFactory;

type Children = Arc<Vec<Arc<dyn TestEngineRunner>>>;

pub struct AggregatingRunner {
    package: TestPackage,
    factory: Arc<dyn ChildFactory>,
    level_of_parallelism: usize,
    dispose_runners: bool,
    children: Mutex<Option<Children>>,
    unload_errors: Mutex<Vec<EngineError>>,
}

impl AggregatingRunner {
    pub fn new(package: TestPackage, factory: Arc<dyn ChildFactory>, level_of_parallelism: usize) -> Self {
        let dispose_runners = package.bool_setting(keys::DISPOSE_RUNNERS, false);
        Self {
            package,
            factory,
            level_of_parallelism: level_of_parallelism.max(1),
            dispose_runners,
            children: Mutex::new(None),
            unload_errors: Mutex::new(Vec::new()),
        }
    }

    pub fn level_of_parallelism(&self) -> usize {
        self.level_of_parallelism
    }

    /// Child runners, one per leaf package, created on first use.
    pub fn children(&self) -> Children {
        let mut slot = self.children.lock();
        if let Some(children) = slot.as_ref() {
            return Arc::clone(children);
        }
        let children: Children = Arc::new(
            self.package
                .leaves()
                .into_iter()
                .map(|leaf| self.factory.create_child(leaf))
                .collect(),
        );
        tracing::debug!(
            "created {} child runners for package {} (parallelism {})",
            children.len(),
            self.package.id(),
            self.level_of_parallelism
        );
        *slot = Some(Arc::clone(&children));
        children
    }

    fn run_child(
        &self,
        child: &Arc<dyn TestEngineRunner>,
        listener: &SharedListener,
        filter: &TestFilter,
    ) -> Result<TestEngineResult> {
        let result = child.run(Arc::clone(listener), filter);
        if self.dispose_runners
            && let Err(err) = child.dispose()
        {
            tracing::warn!("failed to dispose runner: {}", err);
            self.unload_errors.lock().push(err);
        }
        result
    }

    /// Unload or dispose every child, collecting all failures.
    fn release_children(&self, dispose: bool) -> Result<()> {
        let children = if dispose { self.children.lock().take() } else { self.children.lock().clone() };
        let mut errors = std::mem::take(&mut *self.unload_errors.lock());
        for child in children.iter().flat_map(|c| c.iter()) {
            let outcome = if dispose { child.dispose() } else { child.unload() };
            if let Err(err) = outcome {
                errors.push(err);
            }
        }
        match EngineError::unload(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl TestEngineRunner for AggregatingRunner {
    fn load(&self) -> Result<TestEngineResult> {
        let results = self.children().iter().map(|c| c.load()).collect::<Result<Vec<_>>>()?;
        Ok(TestEngineResult::merge(results))
    }

    fn unload(&self) -> Result<()> {
        self.release_children(false)
    }

    fn count_test_cases(&self, filter: &TestFilter) -> Result<usize> {
        let mut count = 0;
        for child in self.children().iter() {
            count += child.count_test_cases(filter)?;
        }
        Ok(count)
    }

    fn run(&self, listener: SharedListener, filter: &TestFilter) -> Result<TestEngineResult> {
        let children = self.children();

        let outcomes: Vec<Result<TestEngineResult>> =
            if self.level_of_parallelism <= 1 || children.len() <= 1 {
                children.iter().map(|c| self.run_child(c, &listener, filter)).collect()
            } else {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(self.level_of_parallelism)
                    .build()
                    .map_err(|e| EngineError::Engine(format!("failed to start runner pool: {}", e)))?;
                // Indexed collect keeps child order regardless of completion order.
                pool.install(|| {
                    children.par_iter().map(|c| self.run_child(c, &listener, filter)).collect()
                })
            };

        let results = outcomes.into_iter().collect::<Result<Vec<_>>>()?;
        Ok(TestEngineResult::merge(results))
    }

    fn explore(&self, filter: &TestFilter) -> Result<TestEngineResult> {
        let results =
            self.children().iter().map(|c| c.explore(filter)).collect::<Result<Vec<_>>>()?;
        Ok(TestEngineResult::merge(results))
    }

    fn stop_run(&self, force: bool) {
        let children = self.children.lock().clone();
        for child in children.iter().flat_map(|c| c.iter()) {
            child.stop_run(force);
        }
    }

    fn dispose(&self) -> Result<()> {
        self.release_children(true)
    }
}

#[cfg(test)]
#[path = "aggregate_tests.rs"]
mod tests;
