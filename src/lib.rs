//! Puppeteer - multi-agent reasoning orchestrator
//!
//! The orchestration engine lives in the `puppeteer-*` crates. This crate
//! wires them together for the command line: provider and agent setup, run
//! artifacts on disk, and batch evaluation over task datasets.

pub mod artifacts;
pub mod batch;
pub mod setup;

pub use artifacts::{write_report, write_run, write_unanswered};
pub use batch::{load_tasks, run_batch, BatchSummary, EvalRecord};
pub use setup::{build_orchestrator, build_provider};
