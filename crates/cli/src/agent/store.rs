// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle table.
//!
//! Each agent moves Starting -> Ready -> Terminated (or Starting ->
//! Terminated) exactly once. Status is never stored: it is derived from which
//! handles a record holds, so a record cannot claim a state its handles
//! contradict. One lock guards the whole table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use super::agency::{AgentProcess, TestAgent};
use crate::error::{EngineError, Result};

/// Unique agent identifier. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    Starting,
    Ready,
    Terminated,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "Starting",
            Self::Ready => "Ready",
            Self::Terminated => "Terminated",
        };
        f.write_str(s)
    }
}

/// Process and agent handles for one agent.
#[derive(Debug, Clone)]
pub struct AgentRecord<P, A> {
    process: Option<P>,
    agent: Option<A>,
}

impl<P, A> AgentRecord<P, A> {
    fn starting(process: P) -> Self {
        Self { process: Some(process), agent: None }
    }

    fn ready(self, agent: A) -> Self {
        Self { process: self.process, agent: Some(agent) }
    }

    fn terminated() -> Self {
        Self { process: None, agent: None }
    }

    pub fn status(&self) -> AgentStatus {
        match (&self.process, &self.agent) {
            (None, _) => AgentStatus::Terminated,
            (Some(_), None) => AgentStatus::Starting,
            (Some(_), Some(_)) => AgentStatus::Ready,
        }
    }

    pub fn process(&self) -> Option<&P> {
        self.process.as_ref()
    }

    pub fn agent(&self) -> Option<&A> {
        self.agent.as_ref()
    }
}

/// Thread-safe table of agent records.
pub struct AgentStore<P = Arc<dyn AgentProcess>, A = Arc<dyn TestAgent>> {
    records: Mutex<HashMap<AgentId, AgentRecord<P, A>>>,
}

impl<P, A> Default for AgentStore<P, A> {
    fn default() -> Self {
        Self { records: Mutex::new(HashMap::new()) }
    }
}

impl<P: Clone, A: Clone> AgentStore<P, A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly launched process as Starting.
    pub fn add_agent(&self, id: AgentId, process: P) -> Result<()> {
        let mut records = self.records.lock();
        if records.contains_key(&id) {
            return Err(EngineError::invalid_argument(
                "agent_id",
                format!("An agent has already been started with the ID '{}'.", id),
            ));
        }
        records.insert(id, AgentRecord::starting(process));
        Ok(())
    }

    /// Move a Starting agent to Ready.
    pub fn register(&self, id: AgentId, agent: A) -> Result<()> {
        let mut records = self.records.lock();
        match records.get_mut(&id) {
            Some(record) if record.status() == AgentStatus::Starting => {
                let starting = std::mem::replace(record, AgentRecord::terminated());
                *record = starting.ready(agent);
                Ok(())
            }
            other => {
                let status = other.map_or_else(|| "unknown".to_string(), |r| r.status().to_string());
                Err(EngineError::invalid_argument(
                    "agent",
                    format!(
                        "Agent '{}' must have a status of Starting in order to register, but its status was {}.",
                        id, status
                    ),
                ))
            }
        }
    }

    /// Move a Starting or Ready agent to Terminated.
    pub fn mark_terminated(&self, id: AgentId) -> Result<()> {
        let mut records = self.records.lock();
        match records.get_mut(&id) {
            Some(record) => {
                *record = AgentRecord::terminated();
                Ok(())
            }
            None => Err(EngineError::invalid_argument(
                "agent_id",
                format!("An agent has not been started with the ID '{}'.", id),
            )),
        }
    }

    /// The agent handle, when the agent is Ready.
    pub fn is_ready(&self, id: AgentId) -> Option<A> {
        let records = self.records.lock();
        let record = records.get(&id)?;
        match record.status() {
            AgentStatus::Ready => record.agent.clone(),
            _ => None,
        }
    }

    /// The process handle, while the agent is Starting or Ready.
    pub fn is_agent_process_active(&self, id: AgentId) -> Option<P> {
        self.records.lock().get(&id)?.process.clone()
    }

    pub fn status(&self, id: AgentId) -> Option<AgentStatus> {
        self.records.lock().get(&id).map(AgentRecord::status)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
