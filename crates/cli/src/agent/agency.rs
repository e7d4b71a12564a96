// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Agent acquisition.
//!
//! The [`Agency`] launches agent processes through an [`AgentLauncher`],
//! tracks them in an [`AgentStore`], and waits for each to register.
//! Registrations and process exits arrive as messages on channels rather than
//! through callbacks, so neither can reach the store before the agent's
//! Starting record exists.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use super::store::{AgentId, AgentStore};
use crate::config::defaults;
use crate::error::{EngineError, Result};
use crate::package::{TestPackage, keys};
use crate::runner::TestEngineRunner;

// =============================================================================
// BOUNDARY TRAITS
// =============================================================================

/// A worker that loads and runs tests on behalf of a runner.
pub trait TestAgent: Send + Sync {
    fn id(&self) -> AgentId;

    /// A runner that executes `package` inside the agent.
    fn create_runner(&self, package: &TestPackage) -> anyhow::Result<Arc<dyn TestEngineRunner>>;

    fn stop(&self) -> anyhow::Result<()>;
}

/// Handle to a launched agent process.
pub trait AgentProcess: Send + Sync {
    fn pid(&self) -> u32;

    fn kill(&self) -> anyhow::Result<()>;
}

/// Hands out agents to runners.
pub trait AgentProvider: Send + Sync {
    /// Block until an agent for `package` is available.
    fn get_agent(&self, package: &TestPackage) -> Result<Arc<dyn TestAgent>>;

    fn release_agent(&self, agent: &dyn TestAgent);
}

/// Starts agent processes. Runtime-specific launch mechanics live here.
pub trait AgentLauncher: Send + Sync {
    /// Start a process for `request.agent_id`.
    ///
    /// The process must register through `request.registrar` once it is able
    /// to accept work, and report its exit through `request.exits`. Both may
    /// happen before this call returns.
    fn launch(&self, request: LaunchRequest) -> anyhow::Result<Arc<dyn AgentProcess>>;
}

// =============================================================================
// LAUNCH PLUMBING
// =============================================================================

/// Everything a launcher needs to start one agent.
pub struct LaunchRequest {
    pub agent_id: AgentId,
    pub package: TestPackage,
    /// Launch so a debugger can attach.
    pub debug: bool,
    pub exits: ExitNotifier,
    pub registrar: AgentRegistrar,
}

/// A process exit notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentExit {
    pub agent_id: AgentId,
    pub exit_code: i32,
}

/// Sends the exit notice for one agent.
#[derive(Debug, Clone)]
pub struct ExitNotifier {
    agent_id: AgentId,
    tx: Sender<AgentExit>,
}

impl ExitNotifier {
    pub fn notify(&self, exit_code: i32) {
        // The agency may already be gone; nobody is left to care.
        let _ = self.tx.send(AgentExit { agent_id: self.agent_id, exit_code });
    }
}

/// Registration handle for one launched agent. Consumed by the single
/// registration it allows.
pub struct AgentRegistrar {
    agent_id: AgentId,
    tx: Sender<Arc<dyn TestAgent>>,
}

impl AgentRegistrar {
    pub fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    /// Hand `agent` to the waiting agency.
    ///
    /// Fails once the agency has stopped waiting for this agent.
    pub fn register(self, agent: Arc<dyn TestAgent>) -> Result<()> {
        tracing::debug!("agent {} registering", self.agent_id);
        self.tx.send(agent).map_err(|_| {
            EngineError::Engine(format!("agent {} is no longer awaited", self.agent_id))
        })
    }
}

/// Agent wait times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentTiming {
    pub launch_timeout: Duration,
    /// Used instead of `launch_timeout` when debugging agents.
    pub debug_launch_timeout: Duration,
    pub poll_interval: Duration,
}

impl AgentTiming {
    pub fn launch_timeout_for(&self, debug: bool) -> Duration {
        if debug { self.debug_launch_timeout } else { self.launch_timeout }
    }
}

impl Default for AgentTiming {
    fn default() -> Self {
        Self {
            launch_timeout: Duration::from_millis(defaults::LAUNCH_TIMEOUT_MS),
            debug_launch_timeout: Duration::from_millis(defaults::DEBUG_LAUNCH_TIMEOUT_MS),
            poll_interval: Duration::from_millis(defaults::POLL_INTERVAL_MS),
        }
    }
}

/// Agent process exit codes.
pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const PARENT_PROCESS_TERMINATED: i32 = -1;
    pub const FAILED_TO_START_REMOTE_AGENT: i32 = -2;
    pub const DEBUGGER_SECURITY_VIOLATION: i32 = -3;
    pub const DEBUGGER_NOT_IMPLEMENTED: i32 = -4;
    pub const UNABLE_TO_LOCATE_AGENCY: i32 = -5;
    pub const UNEXPECTED_EXCEPTION: i32 = -100;
    pub const STACK_OVERFLOW_EXCEPTION: i32 = -1_073_741_571;
}

/// Human-readable explanation of an agent exit code.
pub fn exit_code_message(exit_code: i32) -> String {
    match exit_code {
        exit_codes::OK => "Agent exited normally".to_string(),
        exit_codes::PARENT_PROCESS_TERMINATED => {
            "Agent exited because its parent process terminated".to_string()
        }
        exit_codes::FAILED_TO_START_REMOTE_AGENT => "Agent failed to start".to_string(),
        exit_codes::DEBUGGER_SECURITY_VIOLATION => {
            "Agent could not launch a debugger: security violation".to_string()
        }
        exit_codes::DEBUGGER_NOT_IMPLEMENTED => {
            "Agent could not launch a debugger: not implemented on this platform".to_string()
        }
        exit_codes::UNABLE_TO_LOCATE_AGENCY => "Agent was unable to locate the agency".to_string(),
        exit_codes::UNEXPECTED_EXCEPTION => "Agent terminated with an unexpected exception".to_string(),
        exit_codes::STACK_OVERFLOW_EXCEPTION => "Agent terminated with a stack overflow".to_string(),
        other => format!("Agent exited with unknown code {}", other),
    }
}

// =============================================================================
// AGENCY
// =============================================================================

/// Launches agents and waits for them to register.
pub struct Agency {
    store: Arc<AgentStore>,
    launcher: Arc<dyn AgentLauncher>,
    timing: AgentTiming,
    exits_tx: Sender<AgentExit>,
    exits_rx: Receiver<AgentExit>,
    /// Exit codes drained before the agent's record was added.
    early_exits: Mutex<HashMap<AgentId, i32>>,
}

impl Agency {
    pub fn new(launcher: Arc<dyn AgentLauncher>, timing: AgentTiming) -> Self {
        let (exits_tx, exits_rx) = crossbeam_channel::unbounded();
        Self {
            store: Arc::new(AgentStore::new()),
            launcher,
            timing,
            exits_tx,
            exits_rx,
            early_exits: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &AgentStore {
        &self.store
    }

    /// Register an agent directly, as a launched process would.
    pub fn register(&self, agent: Arc<dyn TestAgent>) -> Result<()> {
        self.store.register(agent.id(), agent)
    }

    fn handle_exit(&self, exit: AgentExit) {
        {
            let mut early_exits = self.early_exits.lock();
            if self.store.status(exit.agent_id).is_none() {
                // Launched by a concurrent `get_agent` that has not recorded it yet.
                early_exits.insert(exit.agent_id, exit.exit_code);
                return;
            }
        }
        let message = exit_code_message(exit.exit_code);
        if exit.exit_code == exit_codes::OK {
            tracing::debug!("agent {}: {}", exit.agent_id, message);
        } else {
            tracing::warn!("agent {}: {} ({})", exit.agent_id, message, exit.exit_code);
        }
        if let Err(err) = self.store.mark_terminated(exit.agent_id) {
            tracing::warn!("{}", err);
        }
    }

    fn handle_registration(&self, id: AgentId, agent: Arc<dyn TestAgent>) {
        match self.store.register(id, agent) {
            Ok(()) => tracing::debug!("agent {} registered", id),
            Err(err) => tracing::warn!("rejected registration: {}", err),
        }
    }

    fn drain_exits(&self) {
        while let Ok(exit) = self.exits_rx.try_recv() {
            self.handle_exit(exit);
        }
    }

    fn give_up(&self, id: AgentId, process: &dyn AgentProcess) -> EngineError {
        tracing::warn!("agent {} (pid {}) did not register in time; killing it", id, process.pid());
        if let Err(err) = process.kill() {
            tracing::warn!("failed to kill agent process {}: {}", process.pid(), err);
        }
        if let Err(err) = self.store.mark_terminated(id) {
            tracing::warn!("{}", err);
        }
        EngineError::Engine("Unable to acquire remote process agent".to_string())
    }
}

impl AgentProvider for Agency {
    fn get_agent(&self, package: &TestPackage) -> Result<Arc<dyn TestAgent>> {
        let agent_id = AgentId::new();
        let debug = package.bool_setting(keys::DEBUG_AGENT, false);
        // Kept alive here so a registrar dropped without registering never
        // disconnects the channel.
        let (registered_tx, registered_rx) = crossbeam_channel::bounded(1);
        let request = LaunchRequest {
            agent_id,
            package: package.clone(),
            debug,
            exits: ExitNotifier { agent_id, tx: self.exits_tx.clone() },
            registrar: AgentRegistrar { agent_id, tx: registered_tx.clone() },
        };

        let process = self
            .launcher
            .launch(request)
            .map_err(|e| EngineError::wrap("Unable to launch remote process agent", e))?;
        tracing::debug!("launched agent {} as pid {}", agent_id, process.pid());
        let early_exit = {
            let mut early_exits = self.early_exits.lock();
            self.store.add_agent(agent_id, Arc::clone(&process))?;
            early_exits.remove(&agent_id)
        };
        if let Some(exit_code) = early_exit {
            self.handle_exit(AgentExit { agent_id, exit_code });
        }

        let deadline = Instant::now() + self.timing.launch_timeout_for(debug);
        loop {
            self.drain_exits();
            if let Ok(agent) = registered_rx.try_recv() {
                self.handle_registration(agent_id, agent);
            }
            if let Some(agent) = self.store.is_ready(agent_id) {
                return Ok(agent);
            }
            if self.store.is_agent_process_active(agent_id).is_none() {
                return Err(EngineError::Engine(format!(
                    "Remote test agent {} exited before registering",
                    agent_id
                )));
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.give_up(agent_id, process.as_ref()));
            }
            let wait = self.timing.poll_interval.min(deadline - now);
            crossbeam_channel::select! {
                recv(registered_rx) -> agent => {
                    if let Ok(agent) = agent {
                        self.handle_registration(agent_id, agent);
                    }
                }
                recv(self.exits_rx) -> exit => {
                    if let Ok(exit) = exit {
                        self.handle_exit(exit);
                    }
                }
                default(wait) => {}
            }
        }
    }

    fn release_agent(&self, agent: &dyn TestAgent) {
        self.drain_exits();
        if self.store.is_agent_process_active(agent.id()).is_some() {
            if let Err(err) = agent.stop() {
                tracing::warn!("failed to stop agent {}: {}", agent.id(), err);
            }
        } else {
            tracing::debug!("agent {} already terminated", agent.id());
        }
    }
}

#[cfg(test)]
#[path = "agency_tests.rs"]
mod tests;
