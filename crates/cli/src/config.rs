// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration (`corral.toml`).
//!
//! Configured values become package settings during the setup phase, but only
//! where the package does not already carry a value.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::agent::AgentTiming;
use crate::error::{EngineError, Result};
use crate::package::{DomainUsage, ProcessModel, TestPackage, keys};

/// Default values, in milliseconds.
pub mod defaults {
    /// Wait for in-flight work after a forced stop (5s).
    pub const STOP_TIMEOUT_MS: u64 = 5_000;

    /// Wait for an agent to register (30s).
    pub const LAUNCH_TIMEOUT_MS: u64 = 30_000;

    /// Wait for an agent to register while debugging (10min).
    pub const DEBUG_LAUNCH_TIMEOUT_MS: u64 = 600_000;

    /// Registration polling interval.
    pub const POLL_INTERVAL_MS: u64 = 200;
}

/// Top-level `corral.toml` contents.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub run: RunConfig,
    pub agents: AgentsConfig,
}

/// The `[run]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// default | inprocess | separate | multiple
    pub process_model: Option<ProcessModel>,

    /// default | none | single | multiple
    pub domain_usage: Option<DomainUsage>,

    /// Upper bound on agents running at once.
    pub max_agents: Option<usize>,

    pub dispose_runners: Option<bool>,

    pub skip_non_test_assemblies: Option<bool>,

    /// How long a forced stop waits for running tests to finish.
    pub stop_timeout_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            process_model: None,
            domain_usage: None,
            max_agents: None,
            dispose_runners: None,
            skip_non_test_assemblies: None,
            stop_timeout_ms: defaults::STOP_TIMEOUT_MS,
        }
    }
}

/// The `[agents]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentsConfig {
    pub launch_timeout_ms: u64,
    pub debug_launch_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Launch agents so a debugger can attach.
    pub debug: bool,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            launch_timeout_ms: defaults::LAUNCH_TIMEOUT_MS,
            debug_launch_timeout_ms: defaults::DEBUG_LAUNCH_TIMEOUT_MS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            debug: false,
        }
    }
}

impl AgentsConfig {
    pub fn timing(&self) -> AgentTiming {
        AgentTiming {
            launch_timeout: Duration::from_millis(self.launch_timeout_ms),
            debug_launch_timeout: Duration::from_millis(self.debug_launch_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }
}

impl EngineConfig {
    /// Parse configuration text.
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| EngineError::wrap("invalid configuration", e.into()))
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            EngineError::wrap(format!("failed to read {}", path.display()), e.into())
        })?;
        let config = Self::parse(&text).map_err(|e| match e {
            EngineError::Runtime { source, .. } => EngineError::Runtime {
                message: format!("invalid configuration in {}", path.display()),
                source,
            },
            other => other,
        })?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.run.stop_timeout_ms)
    }

    /// Add configured values to `package` where it has no setting yet.
    pub fn apply_to(&self, package: &mut TestPackage) {
        let run = &self.run;
        if let Some(model) = run.process_model {
            set_default(package, keys::PROCESS_MODEL, model.as_str());
        }
        if let Some(usage) = run.domain_usage {
            set_default(package, keys::DOMAIN_USAGE, usage.as_str());
        }
        if let Some(max) = run.max_agents {
            set_default(package, keys::MAX_AGENTS, max);
        }
        if let Some(dispose) = run.dispose_runners {
            set_default(package, keys::DISPOSE_RUNNERS, dispose);
        }
        if let Some(skip) = run.skip_non_test_assemblies {
            set_default(package, keys::SKIP_NON_TEST_ASSEMBLIES, skip);
        }
        if self.agents.debug {
            set_default(package, keys::DEBUG_AGENT, true);
        }
    }
}

fn set_default(
    package: &mut TestPackage,
    key: &str,
    value: impl Into<crate::package::SettingValue>,
) {
    if !package.has_setting(key) {
        package.add_setting(key, value);
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
