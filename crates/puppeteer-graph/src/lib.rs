//! Puppeteer Graph - Provenance graphs for reasoning paths
//!
//! Every path owns one `ActionGraph` (which agent ran which action, with what
//! outcome, in what order) and one `AgentGraph` (who handed control to whom).
//! Both sit on the same append-only arena store. A path's action graph can be
//! flattened to a `PathLog` and rebuilt from it.

pub mod action_graph;
pub mod agent_graph;
pub mod arena;
pub mod path_log;

pub use action_graph::{ActionGraph, ActionNode};
pub use agent_graph::AgentGraph;
pub use arena::{Edge, Graph};
pub use path_log::{PathLog, PathLogEntry};
