//! Error types for Puppeteer

use crate::types::{Answer, NodeId, PathId, PathStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("duplicate node: {0}")]
    DuplicateNode(String),

    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("edge {from} -> {to} would point backwards in the graph")]
    BackEdge { from: String, to: String },

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("action failed: {agent}/{action} - {message}")]
    ActionExecution {
        agent: String,
        action: String,
        message: String,
    },

    #[error("action timed out: {agent}/{action} after {}ms", .after.as_millis())]
    ActionTimeout {
        agent: String,
        action: String,
        after: Duration,
    },

    #[error("path timed out: {path} - {reason}")]
    PathTimeout { path: PathId, reason: String },

    #[error("no path produced an answer ({} paths tried)", .diagnostics.len())]
    NoAnswer { diagnostics: Vec<PathDiagnostic> },

    #[error("arbitration failed: {0}")]
    ArbitrationFailure(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid path log: {0}")]
    InvalidLog(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn duplicate_node(id: NodeId) -> Self {
        Self::DuplicateNode(id.to_string())
    }

    pub fn unknown_node(id: NodeId) -> Self {
        Self::UnknownNode(id.to_string())
    }

    pub fn unknown_agent(agent: impl Into<String>) -> Self {
        Self::UnknownAgent(agent.into())
    }

    pub fn action_failed(
        agent: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ActionExecution {
            agent: agent.into(),
            action: action.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Graph-model misuse. These abort the offending path and are never retried.
    pub fn is_graph_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateNode(_)
                | Self::UnknownNode(_)
                | Self::BackEdge { .. }
                | Self::UnknownAgent(_)
                | Self::UnknownAction(_)
        )
    }

    /// Failures of the opaque model/tool collaborator, recovered by retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ActionExecution { .. } | Self::ActionTimeout { .. })
    }
}

/// Why a path did not contribute an answer to the run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PathDiagnostic {
    pub path_id: PathId,
    pub status: PathStatus,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_answer: Option<Answer>,
}

impl std::fmt::Display for PathDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.path_id, self.status, self.reason)
    }
}
