// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Out-of-process agents: lifecycle tracking and acquisition.

pub mod agency;
pub mod store;

pub use agency::{
    Agency, AgentExit, AgentLauncher, AgentProcess, AgentProvider, AgentRegistrar, AgentTiming,
    ExitNotifier, LaunchRequest, TestAgent, exit_code_message, exit_codes,
};
pub use store::{AgentId, AgentRecord, AgentStatus, AgentStore};
