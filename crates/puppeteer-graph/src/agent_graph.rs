//! Agent graph - control hand-offs between agents along a path

use crate::action_graph::escape;
use crate::arena::{Edge, Graph};
use puppeteer_core::{AgentId, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentGraphSnapshot {
    pub agents: Vec<AgentId>,
    pub edges: Vec<Edge<AgentId>>,
}

/// Coarse companion of the action graph. Unlike the action graph it may
/// contain cycles and self-loops: an agent can take control more than once.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AgentGraph {
    graph: Graph<AgentId, AgentId>,
    current: Option<AgentId>,
}

impl AgentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent node. Fails with `DuplicateNode` if already present.
    pub fn add_node(&mut self, agent: AgentId) -> Result<()> {
        self.graph.add_node(agent.clone(), agent)?;
        Ok(())
    }

    /// Append a control transfer. Both agents must already be nodes.
    pub fn add_edge(&mut self, from: AgentId, to: AgentId) -> Result<u64> {
        self.graph.add_edge(from, to)
    }

    /// Note that `agent` executed the next step: adds the node on first sight
    /// and an edge from the previously active agent.
    pub fn record_step(&mut self, agent: &AgentId) -> Result<Option<u64>> {
        if !self.graph.contains(agent) {
            self.add_node(agent.clone())?;
        }
        let seq = match self.current.take() {
            Some(previous) => Some(self.add_edge(previous, agent.clone())?),
            None => None,
        };
        self.current = Some(agent.clone());
        Ok(seq)
    }

    /// Agent that executed the most recent step.
    pub fn last_agent(&self) -> Option<&AgentId> {
        self.current.as_ref()
    }

    /// Agents that received control from `agent`, in sequence order.
    pub fn handoffs_from(&self, agent: &AgentId) -> Vec<AgentId> {
        self.graph.successors(agent)
    }

    pub fn contains(&self, agent: &AgentId) -> bool {
        self.graph.contains(agent)
    }

    pub fn agents(&self) -> &[AgentId] {
        self.graph.nodes()
    }

    pub fn edges(&self) -> &[Edge<AgentId>] {
        self.graph.edges()
    }

    /// Agent sequence of the path, one entry per recorded step.
    pub fn sequence(&self) -> Vec<AgentId> {
        let mut seq: Vec<AgentId> = Vec::new();
        if let Some(first) = self.graph.edges().first() {
            seq.push(first.from.clone());
        } else if let Some(only) = &self.current {
            seq.push(only.clone());
        }
        seq.extend(self.graph.edges().iter().map(|e| e.to.clone()));
        seq
    }

    pub fn snapshot(&self) -> AgentGraphSnapshot {
        AgentGraphSnapshot {
            agents: self.graph.nodes().to_vec(),
            edges: self.graph.edges().to_vec(),
        }
    }

    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph agents {\n");
        for agent in self.graph.nodes() {
            out.push_str(&format!("  \"{}\";\n", escape(agent.as_str())));
        }
        for edge in self.graph.edges() {
            out.push_str(&format!(
                "  \"{}\" -> \"{}\" [label=\"{}\"];\n",
                escape(edge.from.as_str()),
                escape(edge.to.as_str()),
                edge.seq
            ));
        }
        out.push_str("}\n");
        out
    }
}
