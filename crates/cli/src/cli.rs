// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! CLI argument parsing with clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use corral::package::{DomainUsage, ProcessModel};

/// A test execution engine that loads, isolates, runs and aggregates test packages
#[derive(Parser)]
#[command(name = "corral")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Use specific config file
    #[arg(short = 'C', long = "config", global = true, env = "CORRAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build a test filter and print it
    Filter(FilterArgs),
    /// Show how a set of test files would be run
    Plan(PlanArgs),
}

#[derive(clap::Args)]
pub struct FilterArgs {
    /// Select a test by full name (repeatable)
    #[arg(short, long = "test", value_name = "NAME")]
    pub tests: Vec<String>,

    /// Selection expression, e.g. "cat==Urgent && test=~/Parser/"
    #[arg(short, long = "where", value_name = "EXPR")]
    pub where_clause: Option<String>,
}

#[derive(clap::Args)]
pub struct PlanArgs {
    /// Test assemblies or project files
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<String>,

    /// Process model: default, inprocess, separate or multiple
    #[arg(long, value_name = "MODEL")]
    pub process: Option<ProcessModel>,

    /// Domain usage: default, none, single or multiple
    #[arg(long, value_name = "USAGE")]
    pub domain: Option<DomainUsage>,

    /// Upper bound on agents running at once
    #[arg(long, value_name = "N")]
    pub max_agents: Option<usize>,
}
