//! Tests for puppeteer-core: config, tasks, answers, errors

use puppeteer_core::*;
use serde_json::json;
use std::time::Duration;

// ===========================================================================
// Config
// ===========================================================================

#[test]
fn config_defaults() {
    let config = PuppeteerConfig::default();
    assert_eq!(config.run.paths, 3);
    assert_eq!(config.run.global_timeout(), Duration::from_secs(600));
    assert_eq!(config.run.cancel_grace(), Duration::from_secs(5));
    assert_eq!(config.path.max_steps, 8);
    assert_eq!(config.path.retry_cap, 3);
    assert_eq!(config.path.step_timeout(), Duration::from_secs(120));
    assert!(!config.tools.enabled);
    assert_eq!(config.events.replay_capacity, 10_000);
    assert_eq!(config.arbitration.strategy, ArbitrationStrategy::Majority);
    assert!(config.validate().is_ok());
}

#[test]
fn config_partial_toml_keeps_defaults() {
    let config = PuppeteerConfig::from_toml_str(
        r#"
        [run]
        paths = 5

        [arbitration]
        strategy = "llm"
        "#,
    )
    .unwrap();
    assert_eq!(config.run.paths, 5);
    assert_eq!(config.run.global_timeout_secs, 600);
    assert_eq!(config.path.max_steps, 8);
    assert_eq!(config.arbitration.strategy, ArbitrationStrategy::Llm);
}

#[test]
fn config_toml_roundtrip() {
    let mut config = PuppeteerConfig::default();
    config.path.max_steps = 12;
    config.model.temperature = Some(0.5);
    let parsed = PuppeteerConfig::from_toml_str(&config.to_toml()).unwrap();
    assert_eq!(parsed.path.max_steps, 12);
    assert_eq!(parsed.model.temperature, Some(0.5));
}

#[test]
fn config_rejects_zero_paths() {
    let err = PuppeteerConfig::from_toml_str("[run]\npaths = 0\n").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    let err = PuppeteerConfig::from_toml_str("[path]\nretry_cap = 0\n").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn config_load_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = PuppeteerConfig::load(&dir.path().join("absent.toml"));
    assert_eq!(config.run.paths, 3);

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[run\npaths = ").unwrap();
    assert_eq!(PuppeteerConfig::load(&bad).run.paths, 3);
}

#[test]
fn config_env_overrides() {
    let mut config = PuppeteerConfig::default();
    config
        .apply_overrides([
            ("PUPPETEER_PATHS", "1"),
            ("PUPPETEER_MAX_STEPS", " 4 "),
            ("PUPPETEER_TOOLS_ENABLED", "true"),
            ("PUPPETEER_MODEL", "gpt-4o-mini"),
            ("HOME", "/root"),
        ])
        .unwrap();
    assert_eq!(config.run.paths, 1);
    assert_eq!(config.path.max_steps, 4);
    assert!(config.tools.enabled);
    assert_eq!(config.model.name, "gpt-4o-mini");
}

#[test]
fn config_env_override_errors() {
    let mut config = PuppeteerConfig::default();
    let err = config.apply_overrides([("PUPPETEER_PATHS", "many")]).unwrap_err();
    assert!(err.to_string().contains("PUPPETEER_PATHS"));

    let mut config = PuppeteerConfig::default();
    assert!(config.apply_overrides([("PUPPETEER_PATHS", "0")]).is_err());
}

// ===========================================================================
// Tasks
// ===========================================================================

#[test]
fn task_accepts_dataset_field_names() {
    let task: Task = serde_json::from_value(json!({
        "id": 17,
        "type": "MMLU-Pro",
        "Question": "What is 2+2?\nA. 3\nB. 4",
        "Answer": "B"
    }))
    .unwrap();
    assert_eq!(task.id.as_str(), "17");
    assert_eq!(task.kind, "MMLU-Pro");
    assert!(task.question.starts_with("What is"));
    assert_eq!(task.answer.as_deref(), Some("B"));
    assert_eq!(task.answer_format(), AnswerFormat::MultipleChoice);
}

#[test]
fn task_answer_format_inference_and_override() {
    let analysis = Task::new("t1", "OpenDigger-Analysis", "Analyse the repo");
    assert_eq!(analysis.answer_format(), AnswerFormat::JsonReport);

    let plain = Task::new("t2", "general", "Say hi");
    assert_eq!(plain.answer_format(), AnswerFormat::FreeText);

    let overridden = plain.with_metadata("answer_format", json!("multiple_choice"));
    assert_eq!(overridden.answer_format(), AnswerFormat::MultipleChoice);
}

#[test]
fn task_check_answer() {
    let mc = Task::new("1", "MMLU", "q").with_answer("C");
    assert_eq!(mc.check_answer(&Answer::text("The answer is C.")), Some(true));
    assert_eq!(mc.check_answer(&Answer::text("A")), Some(false));
    assert_eq!(mc.check_answer(&Answer::text("no idea")), Some(false));

    let text = Task::new("2", "general", "q").with_answer("Paris");
    assert_eq!(text.check_answer(&Answer::text(" paris ")), Some(true));

    let unknown = Task::new("3", "general", "q").with_answer("Unknown");
    assert_eq!(unknown.check_answer(&Answer::text("x")), None);
    assert_eq!(Task::new("4", "general", "q").check_answer(&Answer::text("x")), None);
}

// ===========================================================================
// Answers
// ===========================================================================

#[test]
fn answer_emptiness() {
    assert!(Answer::text("   ").is_empty());
    assert!(Answer::json(json!(null)).is_empty());
    assert!(Answer::json(json!({})).is_empty());
    assert!(!Answer::json(json!(0)).is_empty());
    assert!(!Answer::text("A").is_empty());
}

#[test]
fn answer_vote_key_normalises_whitespace() {
    assert_eq!(Answer::text(" A\n").vote_key(), Answer::text("A").vote_key());
    assert_eq!(Answer::json(json!({"a": 1})).vote_key(), r#"{"a":1}"#);
}

#[test]
fn extract_choice_finds_standalone_letter() {
    assert_eq!(extract_choice("Answer: (D)"), Some('D'));
    assert_eq!(extract_choice("The best option is B."), Some('B'));
    assert_eq!(extract_choice("Because the answer is a"), None);
    assert_eq!(extract_choice("Kelvin"), None);
}

#[test]
fn extract_choice_skips_pronoun_and_article() {
    assert_eq!(extract_choice("I think the answer is B."), Some('B'));
    assert_eq!(extract_choice("A careful reading shows C"), Some('C'));
    assert_eq!(extract_choice("I believe it is B"), Some('B'));
    assert_eq!(extract_choice("I am not sure"), None);
}

#[test]
fn extract_choice_prefers_explicit_markers() {
    assert_eq!(extract_choice(" b "), None);
    assert_eq!(extract_choice("E"), Some('E'));
    assert_eq!(extract_choice("(C)."), Some('C'));
    assert_eq!(extract_choice("Option A is tempting, but the answer is D."), Some('D'));
    assert_eq!(extract_choice("B) Mars, because of iron oxide"), Some('B'));
    assert_eq!(extract_choice("So it must be **F** in the end, not G or H"), Some('F'));
    assert_eq!(extract_choice("Choice: J"), Some('J'));
}

#[test]
fn multiple_choice_scoring_reads_prose_replies() {
    assert_eq!(
        AnswerFormat::MultipleChoice.normalize("I think the answer is B."),
        Some(Answer::text("B"))
    );
    assert_eq!(
        AnswerFormat::MultipleChoice.normalize("A careful reading shows C"),
        Some(Answer::text("C"))
    );
    let task = Task::new("mc", "MMLU", "q").with_answer("B");
    assert_eq!(task.check_answer(&Answer::text("I believe it is B")), Some(true));
}

#[test]
fn answer_format_normalize() {
    assert_eq!(
        AnswerFormat::MultipleChoice.normalize("**C**"),
        Some(Answer::text("C"))
    );
    assert_eq!(AnswerFormat::MultipleChoice.normalize("unsure"), None);
    assert_eq!(AnswerFormat::FreeText.normalize("  "), None);

    let report = AnswerFormat::JsonReport
        .normalize("Here you go: {\"analysis_summary\": \"ok\"} done")
        .unwrap();
    assert_eq!(report.value()["analysis_summary"], "ok");
    assert!(AnswerFormat::JsonReport.instruction().contains("governance_advice"));
}

// ===========================================================================
// Errors
// ===========================================================================

#[test]
fn error_classification() {
    assert!(Error::duplicate_node(NodeId(3)).is_graph_error());
    assert!(Error::unknown_agent("ghost").is_graph_error());
    assert!(Error::UnknownAction("teleport".into()).is_graph_error());
    assert!(Error::BackEdge { from: "2".into(), to: "1".into() }.is_graph_error());
    assert!(!Error::unknown_agent("ghost").is_retryable());
    assert!(!Error::config("bad").is_graph_error());

    assert!(Error::action_failed("A", "reasoning", "boom").is_retryable());
    assert!(!Error::action_failed("A", "reasoning", "boom").is_graph_error());
    assert!(!Error::config("bad").is_retryable());
    assert_eq!(
        Error::unknown_node(NodeId(9)).to_string(),
        Error::UnknownNode("9".into()).to_string()
    );
}

#[test]
fn ids_round_trip_through_json() {
    let agent: AgentId = serde_json::from_str("\"Critic\"").unwrap();
    assert_eq!(agent, AgentId::new("Critic"));
    assert_eq!(serde_json::to_string(&agent).unwrap(), "\"Critic\"");

    let path: PathId = serde_json::from_value(json!("path-2")).unwrap();
    assert_eq!(path, PathId::indexed(2));
    assert_eq!(serde_json::to_value(PathId::aggregate()).unwrap(), json!("aggregate"));
}

#[test]
fn path_diagnostic_serializes() {
    let diag = PathDiagnostic {
        path_id: PathId::indexed(1),
        status: PathStatus::TimedOut,
        reason: "time budget exhausted".into(),
        partial_answer: Some(Answer::text("B")),
    };
    let v = serde_json::to_value(&diag).unwrap();
    assert_eq!(v["path_id"], "path-1");
    assert_eq!(v["status"], "TimedOut");
    assert_eq!(v["partial_answer"], "B");
}
