//! Core types for Puppeteer

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};

/// Agent identity - cheaply cloneable, used as a graph node label
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(Arc<str>);

impl AgentId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Reasoning path identifier
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathId(Arc<str>);

impl PathId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    /// Id of the n-th reasoning path of a run.
    pub fn indexed(index: usize) -> Self {
        Self::new(format!("path-{}", index))
    }

    /// Id of the synthetic path that records arbitration.
    pub fn aggregate() -> Self {
        Self::new("aggregate")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PathId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Action node identifier, stable for the lifetime of a path
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Action kind
#[derive(Clone, Copy, Debug, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Reasoning,
    Tool,
    Termination,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionKind::Reasoning => "reasoning",
            ActionKind::Tool => "tool",
            ActionKind::Termination => "termination",
        };
        f.write_str(s)
    }
}

/// Immutable action descriptor. The kind doubles as the capability an agent
/// must declare to execute the action.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Action {
    pub kind: ActionKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Action {
    pub fn new(kind: ActionKind, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn reasoning(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(ActionKind::Reasoning, name, description)
    }

    pub fn tool(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(ActionKind::Tool, name, description)
    }

    pub fn termination(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(ActionKind::Termination, name, description)
    }

    pub fn is_termination(&self) -> bool {
        self.kind == ActionKind::Termination
    }

    /// The capability an agent must hold to execute this action.
    pub fn required_capability(&self) -> ActionKind {
        self.kind
    }
}

/// Outcome of one executed step
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepStatus {
    Success,
    Failure,
}

impl StepStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, StepStatus::Success)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Success => f.write_str("Success"),
            StepStatus::Failure => f.write_str("Failure"),
        }
    }
}

/// Terminal state of a reasoning path
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PathStatus {
    Answered,
    Failed,
    TimedOut,
}

impl std::fmt::Display for PathStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathStatus::Answered => f.write_str("Answered"),
            PathStatus::Failed => f.write_str("Failed"),
            PathStatus::TimedOut => f.write_str("TimedOut"),
        }
    }
}

/// Opaque final answer: a plain string or a structured JSON object.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Answer(Value);

impl Answer {
    pub fn text(s: impl Into<String>) -> Self {
        Self(Value::String(s.into()))
    }

    pub fn json(v: Value) -> Self {
        Self(v)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    /// True for null, blank strings, and empty arrays/objects.
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Object(o) => o.is_empty(),
            _ => false,
        }
    }

    /// Key used to compare answers for voting: trimmed text, or compact JSON.
    pub fn vote_key(&self) -> String {
        match &self.0 {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

impl From<&str> for Answer {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for Answer {
    fn from(s: String) -> Self {
        Self::text(s)
    }
}

/// Expected shape of a task's final answer
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerFormat {
    /// A single option letter.
    MultipleChoice,
    /// A JSON report object.
    JsonReport,
    FreeText,
}

impl AnswerFormat {
    pub const REPORT_KEYS: [&'static str; 4] = [
        "analysis_summary",
        "prediction_next_month",
        "explanation",
        "governance_advice",
    ];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "multiple_choice" => Some(Self::MultipleChoice),
            "json_report" => Some(Self::JsonReport),
            "free_text" => Some(Self::FreeText),
            _ => None,
        }
    }

    /// Instruction appended to prompts that must produce a final answer.
    pub fn instruction(&self) -> String {
        match self {
            Self::MultipleChoice => {
                "Reply with the letter of the single best option and nothing else.".to_string()
            }
            Self::JsonReport => format!(
                "Reply with a single JSON object with the keys {}.",
                Self::REPORT_KEYS
                    .iter()
                    .map(|k| format!("'{}'", k))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::FreeText => "Reply with the final answer only.".to_string(),
        }
    }

    /// Normalise raw model output into an answer of this format.
    /// Returns `None` when nothing usable could be extracted.
    pub fn normalize(&self, raw: &str) -> Option<Answer> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match self {
            Self::MultipleChoice => extract_choice(trimmed).map(|c| Answer::text(c.to_string())),
            Self::JsonReport => match extract_json_object(trimmed) {
                Some(v) => Some(Answer::json(v)),
                None => Some(Answer::text(trimmed)),
            },
            Self::FreeText => Some(Answer::text(trimmed)),
        }
    }
}

/// Option letter (A-J) chosen by a model reply.
///
/// A reply that is only a letter wins, then the last explicit marker
/// (`answer is X`, `Answer: X`, `option X`, `(X)`, `**X**`, leading `X:`).
/// Otherwise the last standalone capital letter is taken, where `I` and `A`
/// followed by a lowercase word are read as English, not as options.
pub fn extract_choice(text: &str) -> Option<char> {
    let trimmed = text.trim().trim_matches(|c: char| !c.is_ascii_alphanumeric());
    if let Some(c) = single_choice(trimmed) {
        return Some(c);
    }
    if let Some(c) = explicit_choice(text) {
        return Some(c);
    }

    let tokens: Vec<&str> = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|tok| !tok.is_empty())
        .collect();
    tokens.iter().enumerate().rev().find_map(|(i, tok)| {
        let c = single_choice(tok)?;
        let followed_by_word = tokens
            .get(i + 1)
            .and_then(|next| next.chars().next())
            .is_some_and(|first| first.is_ascii_lowercase());
        if matches!(c, 'I' | 'A') && followed_by_word {
            None
        } else {
            Some(c)
        }
    })
}

fn single_choice(token: &str) -> Option<char> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if ('A'..='J').contains(&c) => Some(c),
        _ => None,
    }
}

fn explicit_choice(text: &str) -> Option<char> {
    static MARKERS: OnceLock<Option<Regex>> = OnceLock::new();
    let markers = MARKERS
        .get_or_init(|| {
            Regex::new(concat!(
                r"(?:(?i:answer|option|choice)\s*(?:(?i:is)\s*)?[:\-]?\s*[(\[*]*([A-J])\b)",
                r"|\(([A-J])\)",
                r"|\*\*([A-J])\*\*",
                r"|\A\s*([A-J])\s*[:)]",
            ))
            .ok()
        })
        .as_ref()?;
    markers
        .captures_iter(text)
        .filter_map(|caps| caps.iter().skip(1).flatten().next())
        .filter_map(|m| m.as_str().chars().next())
        .last()
}

/// The outermost `{...}` span that parses as a JSON object.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(v) if v.is_object() => Some(v),
        _ => None,
    }
}

/// Task id, accepted as a JSON string or integer
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Str(String),
            Int(i64),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Str(s) => TaskId(s),
            Raw::Int(i) => TaskId(i.to_string()),
        })
    }
}

/// Task submitted to the orchestrator. Immutable once submitted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(alias = "Question")]
    pub question: String,
    /// Ground truth, only consulted by evaluators.
    #[serde(default, alias = "Answer", skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            id: TaskId::new(id),
            kind: kind.into(),
            question: question.into(),
            answer: None,
            metadata: None,
        }
    }

    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    /// Answer format from metadata `answer_format`, else inferred from the type.
    pub fn answer_format(&self) -> AnswerFormat {
        if let Some(fmt) = self
            .metadata
            .as_ref()
            .and_then(|m| m.get("answer_format"))
            .and_then(|v| v.as_str())
            .and_then(AnswerFormat::parse)
        {
            return fmt;
        }
        if self.kind.contains("MMLU") {
            AnswerFormat::MultipleChoice
        } else if self.kind.contains("Analysis") {
            AnswerFormat::JsonReport
        } else {
            AnswerFormat::FreeText
        }
    }

    /// Compare a prediction with the ground truth. `None` if there is no
    /// usable ground truth (missing or "Unknown").
    pub fn check_answer(&self, predicted: &Answer) -> Option<bool> {
        let truth = self.answer.as_deref().map(str::trim)?;
        if truth.is_empty() || truth.eq_ignore_ascii_case("unknown") {
            return None;
        }
        let pred = predicted.to_string();
        Some(match self.answer_format() {
            AnswerFormat::MultipleChoice => {
                extract_choice(&pred).is_some() && extract_choice(&pred) == extract_choice(truth)
            }
            _ => pred.trim().eq_ignore_ascii_case(truth),
        })
    }
}
