// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.
//!
//! Boundary traits implemented outside the engine (drivers, agents, project
//! loaders) return `anyhow::Result`. The engine converts those failures into
//! [`EngineError`] with [`EngineError::wrap`], which never wraps an error that
//! already came from the engine.

use thiserror::Error;

use crate::selection::SelectionError;

/// Result alias used throughout the engine.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Errors raised by the engine core.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An argument violated a precondition or state-machine rule.
    #[error("{message} (parameter '{param}')")]
    InvalidArgument { param: &'static str, message: String },

    /// A selection expression could not be parsed.
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// A collaborator failed while the engine was loading or running tests.
    #[error("{message}")]
    Runtime {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An engine-level failure without an underlying cause.
    #[error("{0}")]
    Engine(String),

    /// One or more runners failed to unload.
    #[error("{}", unload_message(.0))]
    Unload(Vec<EngineError>),
}

impl EngineError {
    /// Build an invalid-argument error naming the offending parameter.
    pub fn invalid_argument(param: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument { param, message: message.into() }
    }

    /// Wrap a collaborator failure, preserving it as the source.
    ///
    /// If `err` already is an engine error it is returned unchanged.
    pub fn wrap(message: impl Into<String>, err: anyhow::Error) -> Self {
        match err.downcast::<EngineError>() {
            Ok(engine) => engine,
            Err(other) => Self::Runtime { message: message.into(), source: other.into() },
        }
    }

    /// Combine collected unload failures into one error, if there are any.
    pub fn unload(errors: Vec<EngineError>) -> Option<Self> {
        if errors.is_empty() { None } else { Some(Self::Unload(errors)) }
    }
}

fn unload_message(errors: &[EngineError]) -> String {
    match errors {
        [single] => format!("An exception occurred while unloading: {}", single),
        _ => {
            let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
            format!(
                "Multiple exceptions occurred while unloading ({}): {}",
                errors.len(),
                details.join("; ")
            )
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
