//! Action registry - the fixed action catalog and who may run what
//!
//! Built once at startup and shared read-only by every path.

use puppeteer_core::{Action, ActionKind, AgentId, Error, Result};
use std::collections::HashMap;

/// Name of the pseudo-action recorded on the aggregation path.
pub const ARBITRATE: &str = "arbitrate";

#[derive(Clone, Debug, Default)]
pub struct ActionRegistry {
    actions: Vec<Action>,
    grants: HashMap<AgentId, Vec<usize>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The builtin catalog.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        let catalog = [
            Action::reasoning(
                "reasoning",
                "Think step by step about the task and work towards a solution",
            ),
            Action::reasoning("critique", "Point out flaws or gaps in the reasoning so far"),
            Action::reasoning("question", "Raise the open questions that still block an answer"),
            Action::reasoning("reflect", "Reflect on the progress made and what to do next"),
            Action::reasoning("conclude", "Draw a conclusion from the steps so far"),
            Action::reasoning("modify", "Correct the most recent result where it is wrong"),
            Action::reasoning("summarize", "Summarize the findings so far"),
            Action::reasoning("planning", "Lay out a plan for solving the task"),
            Action::tool("run_python", "Run Python code to compute or inspect data"),
            Action::tool("read_file", "Read a file from the workspace"),
            Action::termination("terminate", "Give the final answer"),
        ];
        registry.actions.extend(catalog);
        registry
    }

    /// Pseudo-action used for the arbitration step.
    pub fn arbitration_action() -> Action {
        Action::termination(ARBITRATE, "Combine the answers of all reasoning paths")
    }

    /// Add an action to the catalog. Names are unique.
    pub fn register(&mut self, action: Action) -> Result<()> {
        if self.find(&action.name).is_some() {
            return Err(Error::config(format!("action {} registered twice", action.name)));
        }
        self.actions.push(action);
        Ok(())
    }

    /// Declare which actions `agent` may run. Replaces an earlier declaration.
    pub fn enroll<I, S>(&mut self, agent: AgentId, actions: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut positions = Vec::new();
        for name in actions {
            let name = name.as_ref();
            let position = self
                .position(name)
                .ok_or_else(|| Error::UnknownAction(name.to_string()))?;
            if !positions.contains(&position) {
                positions.push(position);
            }
        }
        positions.sort_unstable();
        self.grants.insert(agent, positions);
        Ok(())
    }

    pub fn is_enrolled(&self, agent: &AgentId) -> bool {
        self.grants.contains_key(agent)
    }

    /// Reasoning actions, then tool actions when enabled, then termination
    /// actions. Registration order within each kind.
    pub fn available_actions(&self, tools_enabled: bool) -> Vec<&Action> {
        let mut out = Vec::with_capacity(self.actions.len());
        for kind in [ActionKind::Reasoning, ActionKind::Tool, ActionKind::Termination] {
            if kind == ActionKind::Tool && !tools_enabled {
                continue;
            }
            out.extend(self.actions.iter().filter(|a| a.kind == kind));
        }
        out
    }

    /// Actions `agent` declared, in registration order.
    pub fn actions_for(&self, agent: &AgentId) -> Result<Vec<&Action>> {
        let positions = self
            .grants
            .get(agent)
            .ok_or_else(|| Error::unknown_agent(agent.as_str()))?;
        Ok(positions.iter().map(|&i| &self.actions[i]).collect())
    }

    pub fn find(&self, name: &str) -> Option<&Action> {
        self.position(name).map(|i| &self.actions[i])
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.actions.iter().position(|a| a.name == name)
    }
}
