//! puppeteer - multi-agent reasoning orchestrator
//!
//! Usage:
//!   puppeteer run --task task.json                 → solve one task
//!   puppeteer run --question "2+2?" --type Math    → solve an ad-hoc question
//!   puppeteer batch --tasks mmlu.jsonl --out results.jsonl
//!   puppeteer replay --log logs/<task>/<ts>/path_0.jsonl
//!   puppeteer --dump-config                        → print the effective config

use anyhow::Context;
use clap::{Parser, Subcommand};
use puppeteer::{build_orchestrator, build_provider, load_tasks, run_batch, write_report};
use puppeteer_agent::{
    default_personas, load_personas, EventRecord, Orchestrator, Persona, Subscription,
};
use puppeteer_core::{PuppeteerConfig, Task};
use puppeteer_graph::PathLog;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "puppeteer",
    about = "Multi-agent reasoning orchestrator",
    version = env!("CARGO_PKG_VERSION"),
    long_about = "puppeteer explores a task on several parallel reasoning paths.\n\
                   Each path lets a rotating set of agents take actions until one\n\
                   of them concludes, then the answers are arbitrated into one."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (TOML); missing or unreadable files fall back to defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Persona catalog (JSON Lines); built-in personas when omitted
    #[arg(short, long, global = true)]
    personas: Option<PathBuf>,

    /// Answer every model call with a fixed reply instead of a real provider
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "A")]
    mock: Option<String>,

    /// Also write logs to a daily rotating file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Print the effective config as TOML and exit
    #[arg(long)]
    dump_config: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a single task
    Run {
        /// Task file (JSON object)
        #[arg(short, long, conflicts_with = "question")]
        task: Option<PathBuf>,

        /// Ad-hoc question instead of a task file
        #[arg(short, long)]
        question: Option<String>,

        /// Task type for --question
        #[arg(long = "type", default_value = "General")]
        kind: String,

        /// Root directory for run artifacts
        #[arg(long, default_value = "logs")]
        artifacts: PathBuf,

        /// Do not write run artifacts
        #[arg(long)]
        no_artifacts: bool,

        /// Print every event as a JSON line on stdout
        #[arg(long)]
        events: bool,
    },
    /// Evaluate a dataset of tasks
    Batch {
        /// Tasks (JSON array or JSON Lines)
        #[arg(short, long)]
        tasks: PathBuf,

        /// Evaluation records (JSON Lines)
        #[arg(short, long, default_value = "results.jsonl")]
        out: PathBuf,

        /// Root directory for per-task run artifacts
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },
    /// Rebuild a path from its log and print it
    Replay {
        /// Path log (JSON Lines)
        #[arg(short, long)]
        log: PathBuf,

        /// Print the graph in DOT format instead
        #[arg(long)]
        dot: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_dir.as_deref())?;

    let mut config = match &cli.config {
        Some(path) => PuppeteerConfig::load(path),
        None => PuppeteerConfig::default(),
    };
    config.apply_env().context("invalid PUPPETEER_* override")?;

    if cli.dump_config {
        print!("{}", config.to_toml());
        return Ok(());
    }

    let Some(command) = cli.command else {
        anyhow::bail!("no command given, see --help");
    };

    match command {
        Commands::Run {
            task,
            question,
            kind,
            artifacts,
            no_artifacts,
            events,
        } => {
            let task = match (task, question) {
                (Some(path), _) => read_task(&path)?,
                (None, Some(question)) => Task::new("adhoc", kind, question),
                (None, None) => anyhow::bail!("either --task or --question is required"),
            };
            let orchestrator = orchestrator(&cli.personas, cli.mock.as_deref(), config)?;
            let artifacts = (!no_artifacts).then_some(artifacts.as_path());
            run_one(&orchestrator, task, artifacts, events).await
        }
        Commands::Batch { tasks, out, artifacts } => {
            let tasks =
                load_tasks(&tasks).with_context(|| format!("loading {}", tasks.display()))?;
            let orchestrator = orchestrator(&cli.personas, cli.mock.as_deref(), config)?;
            info!(tasks = tasks.len(), out = %out.display(), "Batch started");
            let summary = run_batch(&orchestrator, tasks, &out, artifacts.as_deref()).await?;
            match summary.accuracy() {
                Some(acc) => println!(
                    "{}/{} correct ({:.2}%), {} answered of {}",
                    summary.correct,
                    summary.evaluated,
                    acc * 100.0,
                    summary.answered,
                    summary.total
                ),
                None => println!("{} answered of {}", summary.answered, summary.total),
            }
            Ok(())
        }
        Commands::Replay { log, dot } => {
            let graph = PathLog::read_from(&log)
                .and_then(|path_log| path_log.replay())
                .with_context(|| format!("replaying {}", log.display()))?;
            if dot {
                print!("{}", graph.to_dot());
            } else {
                for (i, node) in graph.nodes().iter().enumerate() {
                    println!(
                        "Step {}: Agent [{}] -> Action [{}] ({})",
                        i + 1,
                        node.agent,
                        node.action.name,
                        node.status
                    );
                }
            }
            Ok(())
        }
    }
}

fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "puppeteer.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "puppeteer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(guard)
}

fn read_task(path: &Path) -> anyhow::Result<Task> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn orchestrator(
    personas: &Option<PathBuf>,
    mock: Option<&str>,
    config: PuppeteerConfig,
) -> anyhow::Result<Orchestrator> {
    let personas: Vec<Persona> = match personas {
        Some(path) => load_personas(path).with_context(|| format!("loading {}", path.display()))?,
        None => default_personas(),
    };
    let provider = build_provider(&config.model, mock)?;
    Ok(build_orchestrator(config, &personas, provider)?)
}

async fn run_one(
    orchestrator: &Orchestrator,
    task: Task,
    artifacts: Option<&Path>,
    print_events: bool,
) -> anyhow::Result<()> {
    let mut subscription = print_events.then(|| orchestrator.events().subscribe());
    let run = orchestrator.run_report(task);
    tokio::pin!(run);

    let report = loop {
        tokio::select! {
            report = &mut run => break report,
            Some(record) = next_event(subscription.as_mut()) => print_event(&record),
        }
    };
    if let Some(subscription) = subscription.as_mut() {
        subscription.drain().iter().for_each(print_event);
    }

    if let Some(root) = artifacts {
        let dir = write_report(root, &report)?;
        info!("Artifacts written to {}", dir.display());
    }
    let outcome = report.into_result()?;
    for diagnostic in outcome.diagnostics() {
        info!(path = %diagnostic.path_id, status = %diagnostic.status, "{}", diagnostic.reason);
    }
    println!("{}", outcome.answer);
    Ok(())
}

async fn next_event(subscription: Option<&mut Subscription>) -> Option<EventRecord> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

fn print_event(record: &EventRecord) {
    if let Ok(line) = serde_json::to_string(record) {
        println!("{}", line);
    }
}
