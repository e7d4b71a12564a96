// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Framework driver boundary.
//!
//! Drivers discover and execute tests inside one assembly. The engine only
//! calls the operations below and never inspects driver internals.

use std::sync::Arc;

use crate::package::Settings;

/// Receives progress events as tagged text.
pub trait TestEventListener: Send + Sync {
    fn on_test_event(&self, event: &str);
}

impl<F> TestEventListener for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_test_event(&self, event: &str) {
        self(event)
    }
}

pub type SharedListener = Arc<dyn TestEventListener>;

/// One loaded assembly.
///
/// Filters are passed as `<filter>` text. Results are single fragments.
pub trait TestDriver: Send + Sync {
    fn load(&self, path: &str, settings: &Settings) -> anyhow::Result<String>;

    fn count_test_cases(&self, filter: &str) -> anyhow::Result<usize>;

    fn run(&self, listener: &dyn TestEventListener, filter: &str) -> anyhow::Result<String>;

    fn explore(&self, filter: &str) -> anyhow::Result<String>;

    /// Ask a running `run` to stop; `force` cancels without waiting.
    fn stop_run(&self, force: bool) -> anyhow::Result<()>;
}

/// Finds the driver for an assembly.
pub trait DriverService: Send + Sync {
    fn get_driver(
        &self,
        path: &str,
        target_framework: Option<&str>,
        skip_non_test_assemblies: bool,
    ) -> anyhow::Result<Arc<dyn TestDriver>>;
}
