//! Path executor - one reasoning path as an explicit state machine
//!
//! Init -> Selecting -> Executing -> Recording -> (Selecting | Terminated)
//!
//! Only Executing suspends, and always under a timeout bounded by the step
//! timeout, the path's time budget and the run deadline. The graphs are
//! owned by the executor; nothing about a path is shared while it runs.

use crate::agent::{AgentCatalog, StepContext};
use crate::events::{Event, EventStream};
use crate::policy::{Selection, SelectionPolicy, SelectionState};
use crate::registry::ActionRegistry;
use puppeteer_core::{
    Answer, Error, NodeId, PathConfig, PathDiagnostic, PathId, PathStatus, StepStatus, Task,
};
use puppeteer_graph::{ActionGraph, AgentGraph};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const REASON_STEP_BUDGET: &str = "step budget exhausted";
pub const REASON_TIME_BUDGET: &str = "time budget exhausted";
pub const REASON_RUN_TIMEOUT: &str = "run timeout";

/// Per-path budgets.
#[derive(Clone, Debug)]
pub struct PathLimits {
    pub max_steps: usize,
    pub time_budget: Duration,
    pub step_timeout: Duration,
    pub retry_cap: u32,
    pub tools_enabled: bool,
}

impl PathLimits {
    pub fn from_config(path: &PathConfig, tools_enabled: bool) -> Self {
        Self {
            max_steps: path.max_steps,
            time_budget: path.time_budget(),
            step_timeout: path.step_timeout(),
            retry_cap: path.retry_cap,
            tools_enabled,
        }
    }
}

/// Terminal result of a path, with the graphs it recorded.
#[derive(Clone, Debug)]
pub struct PathOutcome {
    pub path_id: PathId,
    pub status: PathStatus,
    /// Present exactly when the path is Answered.
    pub answer: Option<Answer>,
    pub reason: String,
    pub action_graph: ActionGraph,
    pub agent_graph: AgentGraph,
}

impl PathOutcome {
    /// Outcome for a path that never reported back before being abandoned.
    pub fn abandoned(path_id: PathId, status: PathStatus, reason: impl Into<String>) -> Self {
        Self {
            path_id,
            status,
            answer: None,
            reason: reason.into(),
            action_graph: ActionGraph::new(),
            agent_graph: AgentGraph::new(),
        }
    }

    pub fn is_answered(&self) -> bool {
        self.status == PathStatus::Answered && self.answer.is_some()
    }

    /// Payload of the last successful step, if it is a usable answer.
    pub fn partial_answer(&self) -> Option<Answer> {
        self.action_graph
            .last_success()
            .map(|node| Answer::json(node.payload.clone()))
            .filter(|answer| !answer.is_empty())
    }

    pub fn diagnostic(&self) -> PathDiagnostic {
        PathDiagnostic {
            path_id: self.path_id.clone(),
            status: self.status,
            reason: self.reason.clone(),
            partial_answer: self.partial_answer(),
        }
    }
}

/// Which limit bounded a step's execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Limit {
    Step,
    Budget,
    Run,
}

enum StepResult {
    Success(Value),
    Failure { message: String, limit: Option<Limit> },
    Cancelled,
}

enum PathState {
    Init,
    Selecting,
    Executing(Selection),
    Recording(Selection, StepResult),
    Terminated(PathStatus, String),
}

pub struct PathExecutor {
    path_id: PathId,
    path_index: usize,
    task: Arc<Task>,
    registry: Arc<ActionRegistry>,
    catalog: Arc<AgentCatalog>,
    policy: Arc<dyn SelectionPolicy>,
    events: EventStream,
    limits: PathLimits,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl PathExecutor {
    pub fn new(
        path_index: usize,
        task: Arc<Task>,
        registry: Arc<ActionRegistry>,
        catalog: Arc<AgentCatalog>,
        policy: Arc<dyn SelectionPolicy>,
        events: EventStream,
        limits: PathLimits,
    ) -> Self {
        Self {
            path_id: PathId::indexed(path_index),
            path_index,
            task,
            registry,
            catalog,
            policy,
            events,
            limits,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Run deadline shared by all paths of a run.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Token that stops the path at its next suspension point.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn path_id(&self) -> &PathId {
        &self.path_id
    }

    pub async fn run(self) -> PathOutcome {
        let started = Instant::now();
        let budget_end = started + self.limits.time_budget;
        let mut actions = ActionGraph::new();
        let mut agents = AgentGraph::new();
        let mut failures: HashMap<String, u32> = HashMap::new();
        let mut answer: Option<Answer> = None;

        let mut state = PathState::Init;
        let (status, reason) = loop {
            state = match state {
                PathState::Init => {
                    info!(path = %self.path_id, task = %self.task.id, "Path started");
                    PathState::Selecting
                }

                PathState::Selecting => {
                    let now = Instant::now();
                    if self.cancel.is_cancelled() || self.deadline.is_some_and(|d| now >= d) {
                        PathState::Terminated(PathStatus::TimedOut, REASON_RUN_TIMEOUT.into())
                    } else if actions.step_count() as usize >= self.limits.max_steps {
                        PathState::Terminated(PathStatus::TimedOut, REASON_STEP_BUDGET.into())
                    } else if now >= budget_end {
                        PathState::Terminated(PathStatus::TimedOut, REASON_TIME_BUDGET.into())
                    } else {
                        let view = SelectionState {
                            path_index: self.path_index,
                            actions: &actions,
                            agents: &agents,
                            steps_remaining: self.limits.max_steps - actions.step_count() as usize,
                            failures: &failures,
                            retry_cap: self.limits.retry_cap,
                            tools_enabled: self.limits.tools_enabled,
                        };
                        match self.policy.select(&self.registry, &self.catalog, &view) {
                            Ok(Some(selection)) => PathState::Executing(selection),
                            Ok(None) => PathState::Terminated(
                                PathStatus::Failed,
                                "no selectable action".into(),
                            ),
                            Err(e) => PathState::Terminated(PathStatus::Failed, e.to_string()),
                        }
                    }
                }

                PathState::Executing(selection) => {
                    match self.execute(&selection, &actions, budget_end).await {
                        Ok(result) => PathState::Recording(selection, result),
                        Err(e) => {
                            warn!(path = %self.path_id, error = %e, "Path aborted");
                            PathState::Terminated(PathStatus::Failed, e.to_string())
                        }
                    }
                }

                PathState::Recording(selection, result) => {
                    let (status, payload) = match &result {
                        StepResult::Success(value) => (StepStatus::Success, value.clone()),
                        StepResult::Failure { message, .. } => {
                            (StepStatus::Failure, json!({ "error": message }))
                        }
                        StepResult::Cancelled => {
                            (StepStatus::Failure, json!({ "error": REASON_RUN_TIMEOUT }))
                        }
                    };
                    let recorded =
                        self.record(&mut actions, &mut agents, &selection, status, payload);
                    if let Err(e) = recorded {
                        warn!(path = %self.path_id, error = %e, "Recording failed, aborting path");
                        PathState::Terminated(PathStatus::Failed, e.to_string())
                    } else {
                        self.after_step(selection, result, &mut failures, &mut answer)
                    }
                }

                PathState::Terminated(status, reason) => break (status, reason),
            };
        };

        info!(
            path = %self.path_id,
            status = %status,
            steps = actions.step_count(),
            reason = %reason,
            "Path terminated"
        );
        self.events.publish(Event::PathTerminated {
            path_id: self.path_id.clone(),
            status,
            answer: answer.clone(),
        });

        PathOutcome {
            path_id: self.path_id,
            status,
            answer,
            reason,
            action_graph: actions,
            agent_graph: agents,
        }
    }

    /// Run the selected action. `Err` only for graph-model errors, which
    /// abort the path.
    async fn execute(
        &self,
        selection: &Selection,
        history: &ActionGraph,
        budget_end: Instant,
    ) -> Result<StepResult, Error> {
        let agent = self.catalog.get(&selection.agent)?;
        let (timeout, limit) = self.step_limit(budget_end);
        let ctx = StepContext {
            task: &self.task,
            path_id: &self.path_id,
            step_index: history.step_count(),
            history,
        };

        debug!(
            path = %self.path_id,
            step = history.step_count(),
            agent = %selection.agent,
            action = %selection.action.name,
            "Executing"
        );

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            outcome = tokio::time::timeout(timeout, agent.execute(&selection.action, &ctx)) => {
                Some(outcome)
            }
        };
        let result = match outcome {
            None => StepResult::Cancelled,
            Some(Ok(Ok(payload))) => StepResult::Success(payload),
            Some(Ok(Err(e))) if e.is_graph_error() => return Err(e),
            Some(Ok(Err(e))) => StepResult::Failure { message: e.to_string(), limit: None },
            Some(Err(_)) => StepResult::Failure {
                message: Error::ActionTimeout {
                    agent: selection.agent.to_string(),
                    action: selection.action.name.clone(),
                    after: timeout,
                }
                .to_string(),
                limit: Some(limit),
            },
        };

        // A termination only succeeds with a non-empty answer.
        Ok(match result {
            StepResult::Success(payload)
                if selection.action.is_termination() && Answer::json(payload.clone()).is_empty() =>
            {
                StepResult::Failure { message: "empty answer".into(), limit: None }
            }
            other => other,
        })
    }

    /// Tightest of step timeout, remaining path budget and remaining run time.
    fn step_limit(&self, budget_end: Instant) -> (Duration, Limit) {
        let now = Instant::now();
        let mut bound = (self.limits.step_timeout, Limit::Step);
        let budget_left = budget_end.saturating_duration_since(now);
        if budget_left < bound.0 {
            bound = (budget_left, Limit::Budget);
        }
        if let Some(deadline) = self.deadline {
            let run_left = deadline.saturating_duration_since(now);
            if run_left < bound.0 {
                bound = (run_left, Limit::Run);
            }
        }
        bound
    }

    fn record(
        &self,
        actions: &mut ActionGraph,
        agents: &mut AgentGraph,
        selection: &Selection,
        status: StepStatus,
        payload: Value,
    ) -> Result<(), Error> {
        let previous = actions.last_node().map(|n| n.id);
        let id = NodeId(actions.step_count());
        let node = actions
            .add_node(id, selection.action.clone(), selection.agent.clone(), status, payload)?
            .clone();
        if let Some(previous) = previous {
            actions.add_edge(previous, id)?;
        }
        agents.record_step(&selection.agent)?;

        debug!(
            path = %self.path_id,
            step = id.0,
            agent = %selection.agent,
            action = %selection.action.name,
            status = %status,
            "Step recorded"
        );
        self.events.publish(Event::StepRecorded {
            path_id: self.path_id.clone(),
            node,
        });
        Ok(())
    }

    fn after_step(
        &self,
        selection: Selection,
        result: StepResult,
        failures: &mut HashMap<String, u32>,
        answer: &mut Option<Answer>,
    ) -> PathState {
        match result {
            StepResult::Success(payload) => {
                failures.remove(&selection.action.name);
                if selection.action.is_termination() {
                    *answer = Some(Answer::json(payload));
                    let reason = format!("answered by {}", selection.agent);
                    PathState::Terminated(PathStatus::Answered, reason)
                } else {
                    PathState::Selecting
                }
            }
            StepResult::Cancelled | StepResult::Failure { limit: Some(Limit::Run), .. } => {
                PathState::Terminated(PathStatus::TimedOut, REASON_RUN_TIMEOUT.into())
            }
            StepResult::Failure { limit: Some(Limit::Budget), .. } => {
                PathState::Terminated(PathStatus::TimedOut, REASON_TIME_BUDGET.into())
            }
            StepResult::Failure { message, .. } => {
                let count = failures.entry(selection.action.name.clone()).or_insert(0);
                *count += 1;
                debug!(
                    path = %self.path_id,
                    action = %selection.action.name,
                    attempts = *count,
                    error = %message,
                    "Step failed"
                );
                if *count >= self.limits.retry_cap {
                    PathState::Terminated(
                        PathStatus::Failed,
                        format!(
                            "{} failed {} times: {}",
                            selection.action.name, count, message
                        ),
                    )
                } else {
                    PathState::Selecting
                }
            }
        }
    }
}
