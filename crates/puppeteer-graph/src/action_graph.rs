//! Action graph - which agent executed which action, with what outcome

use crate::arena::{Edge, Graph};
use puppeteer_core::{Action, AgentId, Error, NodeId, Result, StepStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One executed step of a path. Immutable once recorded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionNode {
    pub id: NodeId,
    pub action: Action,
    pub agent: AgentId,
    pub status: StepStatus,
    pub payload: Value,
}

/// Serializable view of a graph, for artifacts and observers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionGraphSnapshot {
    pub nodes: Vec<ActionNode>,
    pub edges: Vec<Edge<NodeId>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionGraph {
    graph: Graph<NodeId, ActionNode>,
    step_counter: u64,
}

impl ActionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step. Fails with `DuplicateNode` if `id` is already present.
    pub fn add_node(
        &mut self,
        id: NodeId,
        action: Action,
        agent: AgentId,
        status: StepStatus,
        payload: Value,
    ) -> Result<&ActionNode> {
        let node = ActionNode { id, action, agent, status, payload };
        let position = self.graph.add_node(id, node)?;
        self.step_counter += 1;
        Ok(&self.graph.nodes()[position])
    }

    /// Record that `from` completed before `to`. Returns the edge sequence number.
    ///
    /// Edges may only point from an earlier node to a later one, which keeps
    /// the graph acyclic.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<u64> {
        let from_pos = self.graph.position(&from).ok_or_else(|| Error::unknown_node(from))?;
        let to_pos = self.graph.position(&to).ok_or_else(|| Error::unknown_node(to))?;
        if to_pos <= from_pos {
            return Err(Error::BackEdge {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        self.graph.add_edge(from, to)
    }

    /// Recorded successors of `id`, in sequence order.
    pub fn dependencies_of(&self, id: NodeId) -> Result<Vec<NodeId>> {
        if !self.graph.contains(&id) {
            return Err(Error::unknown_node(id));
        }
        Ok(self.graph.successors(&id))
    }

    pub fn node_by_id(&self, id: NodeId) -> Option<&ActionNode> {
        self.graph.node(&id)
    }

    /// Number of recorded steps. Equals the node count.
    pub fn step_count(&self) -> u64 {
        self.step_counter
    }

    pub fn nodes(&self) -> &[ActionNode] {
        self.graph.nodes()
    }

    pub fn edges(&self) -> &[Edge<NodeId>] {
        self.graph.edges()
    }

    pub fn last_node(&self) -> Option<&ActionNode> {
        self.graph.nodes().last()
    }

    /// Most recent successful step, the best partial answer of a path.
    pub fn last_success(&self) -> Option<&ActionNode> {
        self.graph.nodes().iter().rev().find(|n| n.status.is_success())
    }

    /// Whether `action` has already succeeded in this graph.
    pub fn has_succeeded(&self, action: &str) -> bool {
        self.graph
            .nodes()
            .iter()
            .any(|n| n.status.is_success() && n.action.name == action)
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn snapshot(&self) -> ActionGraphSnapshot {
        ActionGraphSnapshot {
            nodes: self.graph.nodes().to_vec(),
            edges: self.graph.edges().to_vec(),
        }
    }

    /// Graphviz rendering: green for successful steps, red for failures.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph actions {\n");
        for node in self.graph.nodes() {
            let color = if node.status.is_success() { "green" } else { "red" };
            out.push_str(&format!(
                "  n{} [label=\"{}\\n{}\", color={}];\n",
                node.id,
                escape(&node.action.name),
                escape(node.agent.as_str()),
                color
            ));
        }
        for edge in self.graph.edges() {
            out.push_str(&format!("  n{} -> n{};\n", edge.from, edge.to));
        }
        out.push_str("}\n");
        out
    }
}

pub(crate) fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
