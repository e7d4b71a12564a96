// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! corral: a test execution engine.
//!
//! Loads test packages, picks how they are isolated (in process, in one
//! agent, or one agent per assembly), runs them through framework drivers and
//! merges the per-assembly results into a single `test-run` tree.

pub mod agent;
pub mod config;
pub mod discovery;
pub mod driver;
pub mod engine;
pub mod error;
pub mod filter;
pub mod package;
pub mod project;
pub mod result;
pub mod runner;
pub mod selection;
pub mod work_items;
pub mod xml;

#[cfg(test)]
pub mod test_utils;

pub use config::EngineConfig;
pub use engine::TestEngine;
pub use error::{EngineError, Result};
pub use filter::{TestFilter, TestFilterBuilder};
pub use package::{PackageId, PackageIds, TestPackage};
pub use result::TestEngineResult;
pub use runner::{MasterRunner, RunnerTopology, TestEngineRunner, TestRun};
