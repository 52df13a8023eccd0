//! Orchestrator - fans a task out to parallel paths and aggregates the result

use crate::agent::AgentCatalog;
use crate::arbitrator::{Arbitrator, Candidate, MajorityVote};
use crate::events::{Event, EventStream};
use crate::executor::{PathExecutor, PathLimits, PathOutcome, REASON_RUN_TIMEOUT};
use crate::policy::{RotatingPolicy, SelectionPolicy};
use crate::registry::ActionRegistry;
use chrono::{DateTime, Utc};
use puppeteer_core::{
    Action, AgentId, Answer, Error, NodeId, PathDiagnostic, PathId, PathStatus, PuppeteerConfig,
    Result, StepStatus, Task, TaskId,
};
use puppeteer_graph::{ActionGraph, ActionNode, AgentGraph};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Agent label of the arbitration step.
pub const ARBITRATOR_AGENT: &str = "Arbitrator";

/// Everything a successful run produced.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub run_id: String,
    pub task_id: TaskId,
    pub answer: Answer,
    /// Path whose answer was returned, when no arbitration decided it.
    pub answered_by: Option<PathId>,
    /// All paths in index order.
    pub paths: Vec<PathOutcome>,
    /// Aggregation path, present when arbitration ran.
    pub aggregate: Option<Aggregation>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Graphs of the aggregation path.
#[derive(Clone, Debug)]
pub struct Aggregation {
    pub action_graph: ActionGraph,
    pub agent_graph: AgentGraph,
    /// `Failed` when the arbitrator never decided and the fallback answer was used.
    pub status: PathStatus,
}

/// A run where no path answered. The paths are kept so they can still be
/// written out and replayed.
#[derive(Clone, Debug)]
pub struct UnansweredRun {
    pub run_id: String,
    pub task_id: TaskId,
    pub paths: Vec<PathOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl UnansweredRun {
    pub fn diagnostics(&self) -> Vec<PathDiagnostic> {
        self.paths.iter().map(PathOutcome::diagnostic).collect()
    }

    pub fn into_error(self) -> Error {
        Error::NoAnswer {
            diagnostics: self.diagnostics(),
        }
    }
}

/// What a run produced, answered or not.
#[derive(Clone, Debug)]
pub enum RunReport {
    Answered(RunOutcome),
    Unanswered(UnansweredRun),
}

impl RunReport {
    pub fn task_id(&self) -> &TaskId {
        match self {
            RunReport::Answered(outcome) => &outcome.task_id,
            RunReport::Unanswered(run) => &run.task_id,
        }
    }

    pub fn paths(&self) -> &[PathOutcome] {
        match self {
            RunReport::Answered(outcome) => &outcome.paths,
            RunReport::Unanswered(run) => &run.paths,
        }
    }

    pub fn answer(&self) -> Option<&Answer> {
        match self {
            RunReport::Answered(outcome) => Some(&outcome.answer),
            RunReport::Unanswered(_) => None,
        }
    }

    pub fn into_result(self) -> Result<RunOutcome> {
        match self {
            RunReport::Answered(outcome) => Ok(outcome),
            RunReport::Unanswered(run) => Err(run.into_error()),
        }
    }
}

impl RunOutcome {
    pub fn arbitrated(&self) -> bool {
        self.aggregate.is_some()
    }

    /// Why the paths that did not answer stopped.
    pub fn diagnostics(&self) -> Vec<PathDiagnostic> {
        self.paths
            .iter()
            .filter(|p| !p.is_answered())
            .map(PathOutcome::diagnostic)
            .collect()
    }
}

pub struct Orchestrator {
    config: PuppeteerConfig,
    registry: Arc<ActionRegistry>,
    catalog: Arc<AgentCatalog>,
    policy: Arc<dyn SelectionPolicy>,
    arbitrator: Arc<dyn Arbitrator>,
    events: EventStream,
}

impl Orchestrator {
    pub fn new(config: PuppeteerConfig, registry: ActionRegistry, catalog: AgentCatalog) -> Self {
        let events = EventStream::from_config(&config.events);
        Self {
            config,
            registry: Arc::new(registry),
            catalog: Arc::new(catalog),
            policy: Arc::new(RotatingPolicy),
            arbitrator: Arc::new(MajorityVote),
            events,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn SelectionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_arbitrator(mut self, arbitrator: Arc<dyn Arbitrator>) -> Self {
        self.arbitrator = arbitrator;
        self
    }

    pub fn with_events(mut self, events: EventStream) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventStream {
        &self.events
    }

    pub fn config(&self) -> &PuppeteerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Run on a fresh multi-threaded runtime, for callers outside async code.
    pub fn run_blocking(&self, task: Task) -> Result<RunOutcome> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run(task))
    }

    /// Explore the task on `run.paths` parallel paths and return one answer,
    /// or `NoAnswer` with a diagnostic per path.
    pub async fn run(&self, task: Task) -> Result<RunOutcome> {
        self.run_report(task).await.into_result()
    }

    /// Like [`Orchestrator::run`], but an unanswered run keeps its paths.
    pub async fn run_report(&self, task: Task) -> RunReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let deadline = Instant::now() + self.config.run.global_timeout();
        let task = Arc::new(task);
        info!(
            run = %run_id,
            task = %task.id,
            paths = self.config.run.paths,
            "Run started"
        );

        let (paths, finish_order) = self.run_paths(&task, deadline).await;
        let candidates: Vec<Candidate> = paths
            .iter()
            .filter(|p| p.is_answered())
            .filter_map(|p| {
                p.answer.clone().map(|answer| Candidate {
                    path_id: p.path_id.clone(),
                    answer,
                })
            })
            .collect();

        let (answer, answered_by, aggregate) = match candidates.as_slice() {
            [] => {
                let unanswered = UnansweredRun {
                    run_id,
                    task_id: task.id.clone(),
                    paths,
                    started_at,
                    finished_at: Utc::now(),
                };
                let message = Error::NoAnswer {
                    diagnostics: unanswered.diagnostics(),
                }
                .to_string();
                error!(run = %unanswered.run_id, task = %task.id, "{}", message);
                self.events.publish(Event::Error {
                    scope: format!("run:{}", task.id),
                    message,
                });
                return RunReport::Unanswered(unanswered);
            }
            [only] => (only.answer.clone(), Some(only.path_id.clone()), None),
            many => {
                let fallback = finish_order
                    .iter()
                    .find_map(|&index| {
                        let path_id = &paths[index].path_id;
                        many.iter().find(|c| &c.path_id == path_id)
                    })
                    .unwrap_or(&many[0]);
                let (aggregation, answer) =
                    self.arbitrate(&task, many, fallback, deadline).await;
                (answer, None, Some(aggregation))
            }
        };

        info!(
            run = %run_id,
            task = %task.id,
            arbitrated = aggregate.is_some(),
            answer = %answer,
            "Run completed"
        );
        self.events.publish(Event::RunCompleted {
            task_id: task.id.clone(),
            final_answer: answer.clone(),
        });

        RunReport::Answered(RunOutcome {
            run_id,
            task_id: task.id.clone(),
            answer,
            answered_by,
            paths,
            aggregate,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Spawn all paths and wait for them, up to the deadline plus the cancel
    /// grace. Outcomes are returned in path index order, along with the
    /// indices of the paths that reported back in the order they finished.
    async fn run_paths(
        &self,
        task: &Arc<Task>,
        deadline: Instant,
    ) -> (Vec<PathOutcome>, Vec<usize>) {
        let count = self.config.run.paths;
        let limits = PathLimits::from_config(&self.config.path, self.config.tools.enabled);
        let cancel = CancellationToken::new();

        let mut set = JoinSet::new();
        for index in 0..count {
            let executor = PathExecutor::new(
                index,
                task.clone(),
                self.registry.clone(),
                self.catalog.clone(),
                self.policy.clone(),
                self.events.clone(),
                limits.clone(),
            )
            .with_deadline(deadline)
            .with_cancel(cancel.child_token());
            set.spawn(async move { (index, executor.run().await) });
        }

        let mut outcomes: Vec<Option<PathOutcome>> = vec![None; count];
        let mut order = Vec::with_capacity(count);
        let timed_out =
            tokio::time::timeout_at(deadline, collect(&mut set, &mut outcomes, &mut order))
                .await
                .is_err();

        if timed_out {
            warn!(task = %task.id, "Run deadline reached, cancelling paths");
            cancel.cancel();
            let grace = self.config.run.cancel_grace();
            let drained = collect(&mut set, &mut outcomes, &mut order);
            if tokio::time::timeout(grace, drained).await.is_err() {
                warn!(
                    task = %task.id,
                    remaining = set.len(),
                    "Abandoning paths after cancel grace"
                );
                set.shutdown().await;
            }
        }

        let outcomes = outcomes
            .into_iter()
            .enumerate()
            .map(|(index, outcome)| match outcome {
                Some(outcome) => outcome,
                None => {
                    let (status, reason) = if timed_out {
                        (PathStatus::TimedOut, REASON_RUN_TIMEOUT)
                    } else {
                        (PathStatus::Failed, "path task ended abnormally")
                    };
                    let outcome = PathOutcome::abandoned(PathId::indexed(index), status, reason);
                    self.events.publish(Event::PathTerminated {
                        path_id: outcome.path_id.clone(),
                        status,
                        answer: None,
                    });
                    outcome
                }
            })
            .collect();
        (outcomes, order)
    }

    /// Arbitration pseudo-step on the aggregation path. Retried up to the
    /// retry cap; if every attempt fails `fallback` wins.
    async fn arbitrate(
        &self,
        task: &Task,
        candidates: &[Candidate],
        fallback: &Candidate,
        deadline: Instant,
    ) -> (Aggregation, Answer) {
        let path_id = PathId::aggregate();
        let agent = AgentId::new(ARBITRATOR_AGENT);
        let action = ActionRegistry::arbitration_action();
        let mut graph = ActionGraph::new();
        let mut agents = AgentGraph::new();
        let step_timeout = self.config.path.step_timeout();

        let mut decided: Option<Answer> = None;
        for attempt in 0..self.config.path.retry_cap {
            let timeout = step_timeout.min(deadline.saturating_duration_since(Instant::now()));
            let attempted = self.arbitrator.arbitrate(task, candidates);
            let result = match tokio::time::timeout(timeout, attempted).await {
                Ok(Ok(answer)) if !answer.is_empty() => Ok(answer),
                Ok(Ok(_)) => Err("empty answer".to_string()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("arbitration timed out after {}ms", timeout.as_millis())),
            };

            let (status, payload) = match &result {
                Ok(answer) => (StepStatus::Success, answer.value().clone()),
                Err(message) => (StepStatus::Failure, json!({ "error": message })),
            };
            let recorded = record_step(&mut graph, &mut agents, &agent, &action, status, payload);
            match recorded {
                Ok(node) => {
                    self.events.publish(Event::StepRecorded {
                        path_id: path_id.clone(),
                        node,
                    });
                }
                Err(e) => error!(path = %path_id, error = %e, "Failed to record arbitration step"),
            }

            match result {
                Ok(answer) => {
                    info!(
                        arbitrator = self.arbitrator.name(),
                        candidates = candidates.len(),
                        "Arbitration decided"
                    );
                    decided = Some(answer);
                    break;
                }
                Err(message) => {
                    warn!(attempt = attempt + 1, error = %message, "Arbitration attempt failed");
                    if timeout.is_zero() {
                        break;
                    }
                }
            }
        }

        let (status, answer) = match decided {
            Some(answer) => (PathStatus::Answered, answer),
            None => {
                let err =
                    Error::ArbitrationFailure(format!("falling back to {}", fallback.path_id));
                warn!("{}", err);
                self.events.publish(Event::Error {
                    scope: path_id.to_string(),
                    message: err.to_string(),
                });
                (PathStatus::Failed, fallback.answer.clone())
            }
        };
        self.events.publish(Event::PathTerminated {
            path_id,
            status,
            answer: Some(answer.clone()),
        });
        let aggregation = Aggregation {
            action_graph: graph,
            agent_graph: agents,
            status,
        };
        (aggregation, answer)
    }
}

fn record_step(
    graph: &mut ActionGraph,
    agents: &mut AgentGraph,
    agent: &AgentId,
    action: &Action,
    status: StepStatus,
    payload: serde_json::Value,
) -> Result<ActionNode> {
    let previous = graph.last_node().map(|n| n.id);
    let id = NodeId(graph.step_count());
    let node = graph
        .add_node(id, action.clone(), agent.clone(), status, payload)?
        .clone();
    if let Some(previous) = previous {
        graph.add_edge(previous, id)?;
    }
    agents.record_step(agent)?;
    Ok(node)
}

async fn collect(
    set: &mut JoinSet<(usize, PathOutcome)>,
    outcomes: &mut [Option<PathOutcome>],
    order: &mut Vec<usize>,
) {
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, outcome)) => {
                outcomes[index] = Some(outcome);
                order.push(index);
            }
            Err(e) => error!(error = %e, "Path task did not complete"),
        }
    }
}
