//! Selection policy - which agent runs which action next

use crate::agent::AgentCatalog;
use crate::registry::ActionRegistry;
use puppeteer_core::{Action, ActionKind, AgentId, Result};
use puppeteer_graph::{ActionGraph, AgentGraph};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub agent: AgentId,
    pub action: Action,
}

/// Read-only view of a path handed to the policy.
pub struct SelectionState<'a> {
    pub path_index: usize,
    pub actions: &'a ActionGraph,
    pub agents: &'a AgentGraph,
    /// Steps left before the step budget is exhausted.
    pub steps_remaining: usize,
    /// Failed attempts per action name since that action last succeeded.
    pub failures: &'a HashMap<String, u32>,
    pub retry_cap: u32,
    pub tools_enabled: bool,
}

impl SelectionState<'_> {
    fn exhausted(&self, action: &Action) -> bool {
        self.failures.get(&action.name).copied().unwrap_or(0) >= self.retry_cap
    }
}

/// Picks the next step of a path. `Ok(None)` means nothing is selectable
/// and the path fails.
///
/// A policy must make progress: every selection either completes an action
/// or moves an action closer to its retry cap, and a termination action is
/// chosen once the step budget is nearly spent.
pub trait SelectionPolicy: Send + Sync {
    fn select(
        &self,
        registry: &ActionRegistry,
        catalog: &AgentCatalog,
        state: &SelectionState<'_>,
    ) -> Result<Option<Selection>>;
}

/// Round-robin over agents.
///
/// Starts at agent `path_index mod n` so parallel paths diverge, and
/// afterwards starts right after the agent that ran the last step, which is
/// tried last. Each agent offers its first permitted non-terminal action
/// that has not yet succeeded on this path; when none remain, or only one
/// step is left, a termination action is chosen instead.
#[derive(Clone, Copy, Debug, Default)]
pub struct RotatingPolicy;

impl RotatingPolicy {
    fn rotation(&self, catalog: &AgentCatalog, state: &SelectionState<'_>) -> Vec<usize> {
        let n = catalog.len();
        let start = match state.agents.last_agent().and_then(|a| catalog.position(a)) {
            Some(current) => current + 1,
            None => state.path_index,
        };
        (0..n).map(|offset| (start + offset) % n).collect()
    }

    /// Actions the agent may run right now, in registration order.
    fn permitted<'r>(
        &self,
        registry: &'r ActionRegistry,
        catalog: &AgentCatalog,
        position: usize,
        state: &SelectionState<'_>,
    ) -> Result<Vec<&'r Action>> {
        let agent = &catalog.agents()[position];
        let capabilities = agent.capabilities();
        Ok(registry
            .actions_for(agent.id())?
            .into_iter()
            .filter(|a| capabilities.contains(&a.required_capability()))
            .filter(|a| state.tools_enabled || a.kind != ActionKind::Tool)
            .filter(|a| !state.exhausted(a))
            .collect())
    }
}

impl SelectionPolicy for RotatingPolicy {
    fn select(
        &self,
        registry: &ActionRegistry,
        catalog: &AgentCatalog,
        state: &SelectionState<'_>,
    ) -> Result<Option<Selection>> {
        if catalog.is_empty() {
            return Ok(None);
        }
        let order = self.rotation(catalog, state);
        let pick = |position: usize, action: &Action| Selection {
            agent: catalog.agents()[position].id().clone(),
            action: action.clone(),
        };

        if state.steps_remaining > 1 {
            for &position in &order {
                let next = self
                    .permitted(registry, catalog, position, state)?
                    .into_iter()
                    .find(|a| !a.is_termination() && !state.actions.has_succeeded(&a.name));
                if let Some(action) = next {
                    return Ok(Some(pick(position, action)));
                }
            }
        }

        for &position in &order {
            let next = self
                .permitted(registry, catalog, position, state)?
                .into_iter()
                .find(|a| a.is_termination());
            if let Some(action) = next {
                return Ok(Some(pick(position, action)));
            }
        }
        Ok(None)
    }
}
