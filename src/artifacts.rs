//! Run artifacts - path logs, graph snapshots and the final answer on disk
//!
//! Layout: `<root>/<task_id>/<timestamp>/`
//!   path_<n>.jsonl              replayable path log
//!   action_graph_<n>.json       snapshot, plus .dot rendering
//!   agent_graph_<n>.json        snapshot, plus .dot rendering
//!   aggregate.jsonl             arbitration steps, when arbitration ran
//!   aggregate_agent_graph.json  snapshot, plus .dot rendering
//!   final_answer.json           answer, or null with diagnostics

use chrono::{DateTime, Utc};
use puppeteer_agent::{PathOutcome, RunOutcome, RunReport, UnansweredRun};
use puppeteer_core::{Error, Result, TaskId};
use puppeteer_graph::{ActionGraph, PathLog};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write the artifacts of a run, answered or not.
pub fn write_report(root: &Path, report: &RunReport) -> Result<PathBuf> {
    match report {
        RunReport::Answered(outcome) => write_run(root, outcome),
        RunReport::Unanswered(run) => write_unanswered(root, run),
    }
}

/// Write every artifact of `outcome` and return the run directory.
pub fn write_run(root: &Path, outcome: &RunOutcome) -> Result<PathBuf> {
    let dir = run_dir(root, &outcome.task_id, &outcome.started_at)?;
    write_paths(&dir, &outcome.paths)?;

    if let Some(aggregate) = &outcome.aggregate {
        write_graph(&dir, "aggregate", &aggregate.action_graph)?;
        std::fs::write(dir.join("aggregate.dot"), aggregate.action_graph.to_dot())?;
        std::fs::write(
            dir.join("aggregate_agent_graph.json"),
            serde_json::to_string_pretty(&aggregate.agent_graph.snapshot())?,
        )?;
        std::fs::write(dir.join("aggregate_agent_graph.dot"), aggregate.agent_graph.to_dot())?;
    }

    let summary = json!({
        "run_id": outcome.run_id,
        "task_id": outcome.task_id,
        "answer": outcome.answer,
        "arbitrated": outcome.arbitrated(),
        "answered_by": outcome.answered_by,
        "paths": path_summaries(&outcome.paths),
        "started_at": outcome.started_at,
        "finished_at": outcome.finished_at,
    });
    std::fs::write(dir.join("final_answer.json"), serde_json::to_string_pretty(&summary)?)?;

    debug!("Wrote run artifacts to {}", dir.display());
    Ok(dir)
}

/// Write the paths of a run that produced no answer, so they can be replayed.
pub fn write_unanswered(root: &Path, run: &UnansweredRun) -> Result<PathBuf> {
    let dir = run_dir(root, &run.task_id, &run.started_at)?;
    write_paths(&dir, &run.paths)?;

    let diagnostics = run.diagnostics();
    let error = Error::NoAnswer {
        diagnostics: diagnostics.clone(),
    };
    let summary = json!({
        "run_id": run.run_id,
        "task_id": run.task_id,
        "answer": Value::Null,
        "arbitrated": false,
        "answered_by": Value::Null,
        "error": error.to_string(),
        "diagnostics": diagnostics,
        "paths": path_summaries(&run.paths),
        "started_at": run.started_at,
        "finished_at": run.finished_at,
    });
    std::fs::write(dir.join("final_answer.json"), serde_json::to_string_pretty(&summary)?)?;

    debug!("Wrote unanswered run artifacts to {}", dir.display());
    Ok(dir)
}

fn run_dir(root: &Path, task_id: &TaskId, started_at: &DateTime<Utc>) -> Result<PathBuf> {
    let dir = root
        .join(sanitize(task_id.as_str()))
        .join(started_at.format("%Y%m%d-%H%M%S%.3f").to_string());
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn write_paths(dir: &Path, paths: &[PathOutcome]) -> Result<()> {
    for (index, path) in paths.iter().enumerate() {
        write_graph(dir, &format!("path_{}", index), &path.action_graph)?;
        std::fs::write(
            dir.join(format!("action_graph_{}.json", index)),
            serde_json::to_string_pretty(&path.action_graph.snapshot())?,
        )?;
        std::fs::write(
            dir.join(format!("agent_graph_{}.json", index)),
            serde_json::to_string_pretty(&path.agent_graph.snapshot())?,
        )?;
        std::fs::write(
            dir.join(format!("action_graph_{}.dot", index)),
            path.action_graph.to_dot(),
        )?;
        std::fs::write(
            dir.join(format!("agent_graph_{}.dot", index)),
            path.agent_graph.to_dot(),
        )?;
    }
    Ok(())
}

fn path_summaries(paths: &[PathOutcome]) -> Vec<Value> {
    paths
        .iter()
        .map(|p| {
            json!({
                "path_id": p.path_id,
                "status": p.status,
                "reason": p.reason,
                "steps": p.action_graph.step_count(),
                "answer": p.answer,
            })
        })
        .collect()
}

fn write_graph(dir: &Path, name: &str, graph: &ActionGraph) -> Result<()> {
    PathLog::from_graph(graph).write_to(&dir.join(format!("{}.jsonl", name)))
}

/// Task ids come from datasets; keep them to one safe path component.
fn sanitize(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "task".to_string()
    } else {
        cleaned
    }
}
