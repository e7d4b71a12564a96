// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Runner selection.
//!
//! [`select_topology`] is a pure function of the package and its settings.
//! [`RunnerFactory`] turns the chosen topology into runners.

use std::fmt;
use std::sync::Arc;

use crate::package::{DomainUsage, ProcessModel, TestPackage};

use super::aggregate::AggregatingRunner;
use super::direct::DirectRunner;
use super::not_runnable::NotRunnableRunner;
use super::process::ProcessRunner;
use super::{RunnerContext, TestEngineRunner};

/// Kind of runner an aggregating runner creates for each leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildRunner {
    Isolated,
    Process,
}

/// Shape of the runner tree built for a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerTopology {
    /// Every leaf is unmanaged; nothing is executed.
    NotRunnable,
    /// Drivers called directly in the engine.
    Local,
    /// Drivers called in the engine behind panic isolation.
    Isolated,
    /// A single agent process for the whole package.
    Process,
    /// One child runner per leaf package.
    Aggregating { child: ChildRunner, level_of_parallelism: usize },
}

impl fmt::Display for ChildRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Isolated => write!(f, "isolated"),
            Self::Process => write!(f, "process"),
        }
    }
}

impl fmt::Display for RunnerTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRunnable => write!(f, "not-runnable"),
            Self::Local => write!(f, "local"),
            Self::Isolated => write!(f, "isolated"),
            Self::Process => write!(f, "process"),
            Self::Aggregating { child, level_of_parallelism } => {
                write!(f, "aggregating ({} x{})", child, level_of_parallelism)
            }
        }
    }
}

/// Choose the runner topology for `package`.
///
/// Nested packages (expanded projects) always aggregate so each project can
/// be regrouped in the result tree.
pub fn select_topology(package: &TestPackage, processor_count: usize) -> RunnerTopology {
    let leaves = package.leaves();
    if leaves.iter().all(|leaf| leaf.is_unmanaged()) {
        return RunnerTopology::NotRunnable;
    }

    let leaf_count = leaves.len();
    let process_model = package.process_model();
    let agent_limit = package.max_agents().unwrap_or(processor_count).min(leaf_count).max(1);

    if package.has_nested_packages() {
        return match process_model {
            ProcessModel::InProcess => {
                RunnerTopology::Aggregating { child: ChildRunner::Isolated, level_of_parallelism: 1 }
            }
            ProcessModel::Separate => {
                RunnerTopology::Aggregating { child: ChildRunner::Process, level_of_parallelism: 1 }
            }
            ProcessModel::Default | ProcessModel::Multiple => RunnerTopology::Aggregating {
                child: ChildRunner::Process,
                level_of_parallelism: agent_limit,
            },
        };
    }

    match process_model {
        ProcessModel::InProcess => match package.domain_usage() {
            DomainUsage::None => RunnerTopology::Local,
            DomainUsage::Single => RunnerTopology::Isolated,
            DomainUsage::Default | DomainUsage::Multiple if leaf_count > 1 => {
                RunnerTopology::Aggregating { child: ChildRunner::Isolated, level_of_parallelism: 1 }
            }
            DomainUsage::Default | DomainUsage::Multiple => RunnerTopology::Isolated,
        },
        ProcessModel::Separate => RunnerTopology::Process,
        ProcessModel::Default | ProcessModel::Multiple if leaf_count > 1 => RunnerTopology::Aggregating {
            child: ChildRunner::Process,
            level_of_parallelism: agent_limit,
        },
        ProcessModel::Default | ProcessModel::Multiple => RunnerTopology::Process,
    }
}

/// Creates the runner for one leaf of an aggregating runner.
pub trait ChildFactory: Send + Sync {
    fn create_child(&self, leaf: &TestPackage) -> Arc<dyn TestEngineRunner>;
}

impl<F> ChildFactory for F
where
    F: Fn(&TestPackage) -> Arc<dyn TestEngineRunner> + Send + Sync,
{
    fn create_child(&self, leaf: &TestPackage) -> Arc<dyn TestEngineRunner> {
        self(leaf)
    }
}

struct ChildRunnerFactory {
    kind: ChildRunner,
    context: RunnerContext,
}

impl ChildFactory for ChildRunnerFactory {
    fn create_child(&self, leaf: &TestPackage) -> Arc<dyn TestEngineRunner> {
        if leaf.is_unmanaged() {
            return Arc::new(NotRunnableRunner::new(leaf.clone()));
        }
        match self.kind {
            ChildRunner::Isolated => Arc::new(DirectRunner::isolated(leaf.clone(), &self.context)),
            ChildRunner::Process => {
                Arc::new(ProcessRunner::new(leaf.clone(), Arc::clone(&self.context.agent_provider)))
            }
        }
    }
}

/// Builds engine runners from packages.
#[derive(Clone)]
pub struct RunnerFactory {
    context: RunnerContext,
}

impl RunnerFactory {
    pub fn new(context: RunnerContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &RunnerContext {
        &self.context
    }

    pub fn topology(&self, package: &TestPackage) -> RunnerTopology {
        select_topology(package, self.context.processor_count)
    }

    pub fn make_runner(&self, package: &TestPackage) -> Arc<dyn TestEngineRunner> {
        let topology = self.topology(package);
        tracing::debug!("package {} uses a {} runner", package.id(), topology);

        let package = package.clone();
        match topology {
            RunnerTopology::NotRunnable => Arc::new(NotRunnableRunner::new(package)),
            RunnerTopology::Local => Arc::new(DirectRunner::local(package, &self.context)),
            RunnerTopology::Isolated => Arc::new(DirectRunner::isolated(package, &self.context)),
            RunnerTopology::Process => {
                Arc::new(ProcessRunner::new(package, Arc::clone(&self.context.agent_provider)))
            }
            RunnerTopology::Aggregating { child, level_of_parallelism } => {
                let children = ChildRunnerFactory { kind: child, context: self.context.clone() };
                Arc::new(AggregatingRunner::new(package, Arc::new(children), level_of_parallelism))
            }
        }
    }
}

#[cfg(test)]
#[path = "factory_tests.rs"]
mod tests;
