// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use corral::agent::{AgentProvider, TestAgent};
use corral::driver::{DriverService, TestDriver};
use corral::package::{TestPackage, keys};
use corral::{EngineConfig, EngineError, TestEngine, TestFilterBuilder, discovery};

use cli::{Cli, Command, FilterArgs, PlanArgs};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "CORRAL_LOG";

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("corral: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Command::Filter(args) => run_filter(args),
        Command::Plan(args) => run_plan(cli, args),
    }
}

fn run_filter(args: &FilterArgs) -> anyhow::Result<()> {
    let mut builder = TestFilterBuilder::new();
    for test in &args.tests {
        builder.add_test(test.as_str());
    }
    if let Some(expression) = &args.where_clause {
        builder.select_where(expression)?;
    }
    println!("{}", builder.build().text());
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => discovery::find_config(&std::env::current_dir()?),
    };
    match path {
        Some(path) => Ok(EngineConfig::load(&path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn run_plan(cli: &Cli, args: &PlanArgs) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let engine = TestEngine::new(config, Arc::new(NoDrivers), Arc::new(NoAgents));

    let mut package = engine.create_package(args.files.iter().cloned())?;
    if let Some(model) = args.process {
        package.add_setting(keys::PROCESS_MODEL, model.as_str());
    }
    if let Some(usage) = args.domain {
        package.add_setting(keys::DOMAIN_USAGE, usage.as_str());
    }
    if let Some(max_agents) = args.max_agents {
        package.add_setting(keys::MAX_AGENTS, max_agents);
    }
    engine.prepare(&mut package)?;

    println!("topology: {}", engine.select_topology(&package));
    println!("{}", package.to_text()?);
    Ok(())
}

/// Planning never loads a driver.
struct NoDrivers;

impl DriverService for NoDrivers {
    fn get_driver(
        &self,
        path: &str,
        _target_framework: Option<&str>,
        _skip_non_test_assemblies: bool,
    ) -> anyhow::Result<Arc<dyn TestDriver>> {
        anyhow::bail!("no test framework driver is installed for {}", path)
    }
}

/// Planning never launches an agent.
struct NoAgents;

impl AgentProvider for NoAgents {
    fn get_agent(&self, package: &TestPackage) -> corral::Result<Arc<dyn TestAgent>> {
        Err(EngineError::Engine(format!(
            "no agent launcher is available for package {}",
            package.id()
        )))
    }

    fn release_agent(&self, _agent: &dyn TestAgent) {}
}
