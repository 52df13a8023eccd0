//! End-to-end runs through the command-line wiring with a scripted model.

use puppeteer::{
    build_orchestrator, build_provider, load_tasks, run_batch, write_report, write_run, EvalRecord,
};
use puppeteer_agent::{default_personas, RunReport};
use puppeteer_core::{ArbitrationStrategy, Error, ModelConfig, PathStatus, PuppeteerConfig, Task};
use puppeteer_graph::PathLog;

fn mmlu(id: &str, answer: &str) -> Task {
    Task::new(
        id,
        "MMLU",
        "Which planet is known as the red planet?\nA. Venus\nB. Mars\nC. Jupiter\nD. Saturn",
    )
    .with_answer(answer)
}

fn read_json(path: &std::path::Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn orchestrator(config: PuppeteerConfig, reply: &str) -> puppeteer_agent::Orchestrator {
    let provider = build_provider(&config.model, Some(reply)).unwrap();
    build_orchestrator(config, &default_personas(), provider).unwrap()
}

#[tokio::test]
async fn run_writes_replayable_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(PuppeteerConfig::default(), "The answer is (B)");

    let outcome = orchestrator.run(mmlu("mmlu/7", "B")).await.unwrap();
    assert_eq!(outcome.answer.to_string(), "B");
    assert!(outcome.arbitrated());
    assert!(outcome.paths.iter().all(|p| p.status == PathStatus::Answered));

    let run_dir = write_run(dir.path(), &outcome).unwrap();
    assert!(run_dir.starts_with(dir.path().join("mmlu_7")));
    for name in [
        "path_0.jsonl",
        "path_2.jsonl",
        "action_graph_1.json",
        "agent_graph_1.json",
        "action_graph_0.dot",
        "aggregate.jsonl",
        "aggregate_agent_graph.json",
        "final_answer.json",
    ] {
        assert!(run_dir.join(name).exists(), "missing {}", name);
    }

    let replayed = PathLog::read_from(&run_dir.join("path_1.jsonl"))
        .unwrap()
        .replay()
        .unwrap();
    assert_eq!(replayed.nodes(), outcome.paths[1].action_graph.nodes());

    let summary = read_json(&run_dir.join("final_answer.json"));
    assert_eq!(summary["answer"], "B");
    assert_eq!(summary["arbitrated"], true);
    assert_eq!(summary["paths"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn single_path_run_has_no_aggregate_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = PuppeteerConfig::default();
    config.run.paths = 1;
    let orchestrator = orchestrator(config, "B");

    let outcome = orchestrator.run(mmlu("single", "B")).await.unwrap();
    assert!(!outcome.arbitrated());

    let run_dir = write_run(dir.path(), &outcome).unwrap();
    assert!(run_dir.join("path_0.jsonl").exists());
    assert!(!run_dir.join("aggregate.jsonl").exists());
}

#[tokio::test]
async fn llm_arbitration_is_wired_from_config() {
    let mut config = PuppeteerConfig::default();
    config.arbitration.strategy = ArbitrationStrategy::Llm;
    let orchestrator = orchestrator(config, "B");

    let outcome = orchestrator.run(mmlu("llm", "B")).await.unwrap();
    assert_eq!(outcome.answer.to_string(), "B");
    let aggregate = outcome.aggregate.unwrap();
    assert_eq!(aggregate.status, PathStatus::Answered);
    assert_eq!(aggregate.action_graph.nodes().len(), 1);
    assert_eq!(aggregate.action_graph.nodes()[0].agent.as_str(), "Arbitrator");
}

#[tokio::test]
async fn unanswered_run_still_writes_path_logs() {
    let dir = tempfile::tempdir().unwrap();
    // No choice letter anywhere, so every termination step fails.
    let orchestrator = orchestrator(PuppeteerConfig::default(), "no idea");

    let report = orchestrator.run_report(mmlu("stuck", "B")).await;
    assert!(matches!(report, RunReport::Unanswered(_)));

    let run_dir = write_report(dir.path(), &report).unwrap();
    for name in ["path_0.jsonl", "path_2.jsonl", "agent_graph_1.json", "final_answer.json"] {
        assert!(run_dir.join(name).exists(), "missing {}", name);
    }
    assert!(!run_dir.join("aggregate.jsonl").exists());

    let replayed = PathLog::read_from(&run_dir.join("path_0.jsonl"))
        .unwrap()
        .replay()
        .unwrap();
    assert_eq!(replayed.nodes(), report.paths()[0].action_graph.nodes());

    let summary = read_json(&run_dir.join("final_answer.json"));
    assert!(summary["answer"].is_null());
    assert_eq!(summary["diagnostics"].as_array().unwrap().len(), 3);
    assert!(summary["error"].as_str().unwrap().contains("no path produced an answer"));
}

#[tokio::test]
async fn batch_scores_each_task() {
    let dir = tempfile::tempdir().unwrap();
    let tasks_path = dir.path().join("tasks.jsonl");
    std::fs::write(
        &tasks_path,
        concat!(
            r#"{"id": 1, "type": "MMLU", "Question": "Red planet?\nA. Venus\nB. Mars", "#,
            r#""Answer": "B"}"#,
            "\n\n",
            r#"{"id": 2, "type": "MMLU", "Question": "Largest planet?\nB. Mars\nC. Jupiter", "#,
            r#""Answer": "C"}"#,
            "\n",
            r#"{"id": 3, "type": "Open", "question": "Name a planet.", "answer": "Unknown"}"#,
            "\n",
        ),
    )
    .unwrap();

    let tasks = load_tasks(&tasks_path).unwrap();
    assert_eq!(tasks.len(), 3);

    let out = dir.path().join("results.jsonl");
    let orchestrator = orchestrator(PuppeteerConfig::default(), "B");
    let summary = run_batch(&orchestrator, tasks, &out, Some(&dir.path().join("logs")))
        .await
        .unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.answered, 3);
    assert_eq!(summary.evaluated, 2);
    assert_eq!(summary.correct, 1);
    assert_eq!(summary.accuracy(), Some(0.5));

    let records: Vec<EvalRecord> = std::fs::read_to_string(&out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].id.as_str(), "1");
    assert_eq!(records[0].correct, Some(true));
    assert_eq!(records[1].correct, Some(false));
    assert_eq!(records[1].ground_truth.as_deref(), Some("C"));
    assert_eq!(records[2].correct, None);
    assert!(dir.path().join("logs").join("1").exists());
}

#[tokio::test]
async fn batch_records_unanswered_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("results.jsonl");
    // No choice letter anywhere, so every termination step fails.
    let orchestrator = orchestrator(PuppeteerConfig::default(), "no idea");

    let logs = dir.path().join("logs");
    let summary = run_batch(&orchestrator, vec![mmlu("hard", "B")], &out, Some(&logs))
        .await
        .unwrap();
    assert_eq!(summary.answered, 0);
    assert!(logs.join("hard").exists());
    assert_eq!(summary.evaluated, 1);
    assert_eq!(summary.correct, 0);

    let record: EvalRecord =
        serde_json::from_str(std::fs::read_to_string(&out).unwrap().trim()).unwrap();
    assert!(record.pred.is_none());
    assert_eq!(record.correct, Some(false));
    assert!(record.error.unwrap().contains("no path produced an answer"));
}

#[test]
fn load_tasks_accepts_json_array() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");
    std::fs::write(&path, r#"[{"id": "a", "type": "Math", "question": "1+1?"}]"#).unwrap();

    let tasks = load_tasks(&path).unwrap();
    assert_eq!(tasks[0].id.as_str(), "a");
    assert_eq!(tasks[0].kind, "Math");
}

#[test]
fn load_tasks_reports_bad_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.jsonl");
    let content = "{\"id\": 1, \"type\": \"Math\", \"question\": \"?\"}\nnot json\n";
    std::fs::write(&path, content).unwrap();

    let err = load_tasks(&path).unwrap_err();
    assert!(matches!(err, Error::Config(ref m) if m.starts_with("task line 2")));
}

#[test]
fn provider_requires_known_name_and_key() {
    let mut model = ModelConfig::default();
    model.api_key_env = "PUPPETEER_TEST_KEY_THAT_IS_NEVER_SET".into();
    let err = build_provider(&model, None).err().unwrap();
    assert!(err.to_string().contains("PUPPETEER_TEST_KEY_THAT_IS_NEVER_SET not set"));

    model.api_key_env = "PATH".into();
    model.provider = "carrier-pigeon".into();
    let err = build_provider(&model, None).err().unwrap();
    assert!(err.to_string().contains("unknown model provider: carrier-pigeon"));

    model.provider = "openai".into();
    assert!(build_provider(&model, None).is_ok());
}

#[test]
fn bundled_personas_and_config_load() {
    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    let personas =
        puppeteer_agent::load_personas(&root.join("personas/opendigger_personas.jsonl")).unwrap();
    let names: Vec<&str> = personas.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Planner", "Critic", "Analyst", "Summarizer"]);

    let content = std::fs::read_to_string(root.join("puppeteer.example.toml")).unwrap();
    let config = PuppeteerConfig::from_toml_str(&content).unwrap();
    assert_eq!(config.run.paths, 3);
    assert_eq!(config.arbitration.strategy, ArbitrationStrategy::Majority);

    let provider = build_provider(&config.model, Some("B")).unwrap();
    assert!(build_orchestrator(config, &personas, provider).is_ok());
}
