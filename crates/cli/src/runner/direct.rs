// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Runner that drives framework drivers in the engine process.
//!
//! One driver is loaded per leaf package. Events from drivers pass through a
//! [`WorkItemTracker`] so a forced stop can still finish every started item.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::driver::{DriverService, SharedListener, TestDriver, TestEventListener};
use crate::error::{EngineError, Result};
use crate::filter::TestFilter;
use crate::package::{TestPackage, keys};
use crate::result::TestEngineResult;
use crate::work_items::WorkItemTracker;

use super::not_runnable::{UNMANAGED_MESSAGE, not_runnable_fragment};
use super::{RunnerContext, TestEngineRunner};

/// How driver calls are shielded from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    /// Call drivers directly.
    None,
    /// Contain driver panics, reporting them as engine errors.
    Isolated,
}

enum LoadedLeaf {
    Driver(Arc<dyn TestDriver>),
    NotRunnable(TestPackage),
}

/// Forwards events to the tracker, then to the caller's listener.
struct TrackingListener {
    tracker: Arc<WorkItemTracker>,
    listener: SharedListener,
}

impl TestEventListener for TrackingListener {
    fn on_test_event(&self, event: &str) {
        self.tracker.on_test_event(event);
        self.listener.on_test_event(event);
    }
}

pub struct DirectRunner {
    package: TestPackage,
    isolation: Isolation,
    driver_service: Arc<dyn DriverService>,
    stop_timeout: Duration,
    leaves: Mutex<Option<Arc<Vec<LoadedLeaf>>>>,
    tracker: Arc<WorkItemTracker>,
    current_listener: Mutex<Option<SharedListener>>,
    force_stopped: AtomicBool,
}

impl DirectRunner {
    pub fn new(package: TestPackage, isolation: Isolation, context: &RunnerContext) -> Self {
        Self {
            package,
            isolation,
            driver_service: Arc::clone(&context.driver_service),
            stop_timeout: context.stop_timeout,
            leaves: Mutex::new(None),
            tracker: Arc::new(WorkItemTracker::new()),
            current_listener: Mutex::new(None),
            force_stopped: AtomicBool::new(false),
        }
    }

    pub fn local(package: TestPackage, context: &RunnerContext) -> Self {
        Self::new(package, Isolation::None, context)
    }

    pub fn isolated(package: TestPackage, context: &RunnerContext) -> Self {
        Self::new(package, Isolation::Isolated, context)
    }

    pub fn isolation(&self) -> Isolation {
        self.isolation
    }

    pub fn is_loaded(&self) -> bool {
        self.leaves.lock().is_some()
    }

    /// Invoke a driver operation, converting failures to engine errors.
    fn call<T>(&self, activity: &str, f: impl FnOnce() -> anyhow::Result<T>) -> Result<T> {
        let outcome = match self.isolation {
            Isolation::None => f(),
            Isolation::Isolated => match catch_unwind(AssertUnwindSafe(f)) {
                Ok(outcome) => outcome,
                Err(payload) => Err(anyhow::anyhow!("driver panicked: {}", panic_message(payload.as_ref()))),
            },
        };
        outcome.map_err(|e| {
            EngineError::wrap(format!("An exception occurred in the driver while {} tests.", activity), e)
        })
    }

    fn load_leaves(&self) -> Result<(Arc<Vec<LoadedLeaf>>, TestEngineResult)> {
        let mut loaded = Vec::new();
        let mut result = TestEngineResult::default();

        for leaf in self.package.leaves() {
            if leaf.is_unmanaged() {
                result.push(not_runnable_fragment(leaf, UNMANAGED_MESSAGE, false));
                loaded.push(LoadedLeaf::NotRunnable(leaf.clone()));
                continue;
            }

            let path = leaf.full_name().ok_or_else(|| {
                EngineError::invalid_argument("package", "leaf package has no file path")
            })?;
            let fragment = self.call("loading", || {
                let driver = self.driver_service.get_driver(
                    path,
                    leaf.str_setting(keys::IMAGE_TARGET_FRAMEWORK_NAME),
                    leaf.bool_setting(keys::SKIP_NON_TEST_ASSEMBLIES, false),
                )?;
                let fragment = driver.load(path, leaf.settings())?;
                loaded.push(LoadedLeaf::Driver(driver));
                Ok(fragment)
            })?;
            result.push(fragment);
        }

        tracing::debug!("loaded {} assemblies for package {}", loaded.len(), self.package.id());
        Ok((Arc::new(loaded), result))
    }

    /// Loaded drivers, loading first if needed.
    fn ensure_loaded(&self) -> Result<Arc<Vec<LoadedLeaf>>> {
        if let Some(leaves) = self.leaves.lock().as_ref() {
            return Ok(Arc::clone(leaves));
        }
        let (leaves, _) = self.load_leaves()?;
        *self.leaves.lock() = Some(Arc::clone(&leaves));
        Ok(leaves)
    }

    fn loaded(&self) -> Option<Arc<Vec<LoadedLeaf>>> {
        self.leaves.lock().clone()
    }
}

impl TestEngineRunner for DirectRunner {
    fn load(&self) -> Result<TestEngineResult> {
        let (leaves, result) = self.load_leaves()?;
        *self.leaves.lock() = Some(leaves);
        Ok(result)
    }

    fn unload(&self) -> Result<()> {
        if self.leaves.lock().take().is_some() {
            tracing::debug!("unloaded package {}", self.package.id());
        }
        Ok(())
    }

    fn count_test_cases(&self, filter: &TestFilter) -> Result<usize> {
        let mut count = 0;
        for leaf in self.ensure_loaded()?.iter() {
            if let LoadedLeaf::Driver(driver) = leaf {
                count += self.call("counting", || driver.count_test_cases(filter.text()))?;
            }
        }
        Ok(count)
    }

    fn run(&self, listener: SharedListener, filter: &TestFilter) -> Result<TestEngineResult> {
        let leaves = self.ensure_loaded()?;
        self.tracker.clear();
        self.force_stopped.store(false, Ordering::SeqCst);
        *self.current_listener.lock() = Some(Arc::clone(&listener));
        let tracking = TrackingListener { tracker: Arc::clone(&self.tracker), listener };

        let mut result = TestEngineResult::default();
        let mut outcome = Ok(());
        for leaf in leaves.iter() {
            match leaf {
                LoadedLeaf::Driver(driver) => {
                    match self.call("running", || driver.run(&tracking, filter.text())) {
                        Ok(fragment) => result.push(fragment),
                        Err(err) => {
                            outcome = Err(err);
                            break;
                        }
                    }
                }
                LoadedLeaf::NotRunnable(package) => {
                    result.push(not_runnable_fragment(package, UNMANAGED_MESSAGE, true));
                }
            }
        }

        // Drivers have returned, so nothing still tracked will ever finish.
        if self.force_stopped.load(Ordering::SeqCst) {
            self.tracker.send_pending_test_completion_events(tracking.listener.as_ref());
        }
        outcome.map(|()| result)
    }

    fn explore(&self, filter: &TestFilter) -> Result<TestEngineResult> {
        let mut result = TestEngineResult::default();
        for leaf in self.ensure_loaded()?.iter() {
            match leaf {
                LoadedLeaf::Driver(driver) => {
                    result.push(self.call("exploring", || driver.explore(filter.text()))?);
                }
                LoadedLeaf::NotRunnable(package) => {
                    result.push(not_runnable_fragment(package, UNMANAGED_MESSAGE, false));
                }
            }
        }
        Ok(result)
    }

    fn stop_run(&self, force: bool) {
        let Some(leaves) = self.loaded() else {
            return;
        };
        if force {
            self.force_stopped.store(true, Ordering::SeqCst);
        }
        for leaf in leaves.iter() {
            let LoadedLeaf::Driver(driver) = leaf else {
                continue;
            };
            if let Err(err) = self.call("stopping", || driver.stop_run(force)) {
                tracing::warn!("{}", err);
            }
        }

        // An idle runner has nothing to wait for; the gate only opens on a finish.
        if force
            && self.tracker.pending_count() > 0
            && !self.tracker.wait_for_completion(self.stop_timeout)
        {
            let listener = self.current_listener.lock().clone();
            if let Some(listener) = listener
                && self.tracker.pending_count() > 0
            {
                tracing::warn!(
                    "{} tests did not finish after a forced stop; reporting them as cancelled",
                    self.tracker.pending_count()
                );
                self.tracker.send_pending_test_completion_events(listener.as_ref());
            }
            // Nothing may keep running once a forced stop returns.
            *self.leaves.lock() = None;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "direct_tests.rs"]
mod tests;
