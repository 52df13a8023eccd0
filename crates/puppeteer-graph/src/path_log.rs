//! Path log - the flat, append-only record of one path
//!
//! One JSON line per step, in step order. The log is derived from the action
//! graph and the graph can be rebuilt from the log: node `i` gets id `i` and
//! consecutive steps are chained by an edge, which is exactly how the path
//! executor records them.

use crate::action_graph::ActionGraph;
use puppeteer_core::{Action, AgentId, Error, NodeId, Result, StepStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathLogEntry {
    pub step_index: u64,
    pub agent: AgentId,
    pub action: Action,
    pub result_status: StepStatus,
    pub payload: Value,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathLog {
    entries: Vec<PathLogEntry>,
}

impl PathLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_graph(graph: &ActionGraph) -> Self {
        let entries = graph
            .nodes()
            .iter()
            .enumerate()
            .map(|(i, node)| PathLogEntry {
                step_index: i as u64,
                agent: node.agent.clone(),
                action: node.action.clone(),
                result_status: node.status,
                payload: node.payload.clone(),
            })
            .collect();
        Self { entries }
    }

    /// Append the next step. `step_index` must continue the sequence.
    pub fn append(&mut self, entry: PathLogEntry) -> Result<()> {
        let expected = self.entries.len() as u64;
        if entry.step_index != expected {
            return Err(Error::InvalidLog(format!(
                "expected step {}, got {}",
                expected, entry.step_index
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[PathLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuild the action graph this log was derived from.
    pub fn replay(&self) -> Result<ActionGraph> {
        let mut graph = ActionGraph::new();
        let mut previous: Option<NodeId> = None;
        for entry in &self.entries {
            let id = NodeId(entry.step_index);
            graph.add_node(
                id,
                entry.action.clone(),
                entry.agent.clone(),
                entry.result_status,
                entry.payload.clone(),
            )?;
            if let Some(prev) = previous {
                graph.add_edge(prev, id)?;
            }
            previous = Some(id);
        }
        Ok(graph)
    }

    pub fn to_jsonl(&self) -> Result<String> {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn from_jsonl(content: &str) -> Result<Self> {
        let mut log = Self::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: PathLogEntry = serde_json::from_str(line)
                .map_err(|e| Error::InvalidLog(format!("line {}: {}", lineno + 1, e)))?;
            log.append(entry)?;
        }
        Ok(log)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_jsonl()?)?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        Self::from_jsonl(&std::fs::read_to_string(path)?)
    }
}
