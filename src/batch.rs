//! Batch evaluation - run a dataset of tasks and score the answers

use crate::artifacts::write_report;
use puppeteer_agent::Orchestrator;
use puppeteer_core::{Answer, Error, Result, Task, TaskId};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// One line of the evaluation output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub id: TaskId,
    pub pred: Option<Answer>,
    /// `None` when the task has no usable ground truth.
    pub correct: Option<bool>,
    pub ground_truth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub answered: usize,
    /// Tasks that had a usable ground truth.
    pub evaluated: usize,
    pub correct: usize,
}

impl BatchSummary {
    /// Fraction of evaluated tasks answered correctly.
    pub fn accuracy(&self) -> Option<f64> {
        (self.evaluated > 0).then(|| self.correct as f64 / self.evaluated as f64)
    }
}

/// Tasks from a JSON array or a JSON Lines file.
pub fn load_tasks(path: &Path) -> Result<Vec<Task>> {
    let content = std::fs::read_to_string(path)?;
    if content.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(&content)?);
    }
    let mut tasks = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let task: Task = serde_json::from_str(line)
            .map_err(|e| Error::config(format!("task line {}: {}", lineno + 1, e)))?;
        tasks.push(task);
    }
    Ok(tasks)
}

/// Run every task in order, appending one `EvalRecord` per task to `out`.
/// A task without an answer is recorded, not fatal.
pub async fn run_batch(
    orchestrator: &Orchestrator,
    tasks: Vec<Task>,
    out: &Path,
    artifacts: Option<&Path>,
) -> Result<BatchSummary> {
    let mut file = std::fs::File::create(out)?;
    let mut summary = BatchSummary::default();

    for task in tasks {
        summary.total += 1;
        let id = task.id.clone();
        let ground_truth = task.answer.clone();
        let check = task.clone();

        let report = orchestrator.run_report(task).await;
        if let Some(root) = artifacts {
            if let Err(e) = write_report(root, &report) {
                warn!(task = %id, error = %e, "Failed to write run artifacts");
            }
        }
        let (pred, error) = match report.into_result() {
            Ok(outcome) => (Some(outcome.answer), None),
            Err(e) => (None, Some(e.to_string())),
        };

        let correct = match &pred {
            Some(answer) => check.check_answer(answer),
            None => check.check_answer(&Answer::text("")).map(|_| false),
        };
        if pred.is_some() {
            summary.answered += 1;
        }
        if let Some(ok) = correct {
            summary.evaluated += 1;
            if ok {
                summary.correct += 1;
            }
        }
        info!(task = %id, correct = ?correct, "Task finished");

        let record = EvalRecord { id, pred, correct, ground_truth, error };
        writeln!(file, "{}", serde_json::to_string(&record)?)?;
        file.flush()?;
    }

    match summary.accuracy() {
        Some(acc) => info!(
            total = summary.total,
            correct = summary.correct,
            "Accuracy: {:.2}%",
            acc * 100.0
        ),
        None => info!(total = summary.total, "No tasks with ground truth"),
    }
    Ok(summary)
}
