//! Persona catalog - JSON Lines, one persona per line

use puppeteer_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub system_prompt: String,
    /// Names of the registry actions this persona may run.
    pub actions: Vec<String>,
    /// Model override for this persona.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Persona {
    pub fn new<I, S>(name: impl Into<String>, system_prompt: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: String::new(),
            system_prompt: system_prompt.into(),
            actions: actions.into_iter().map(Into::into).collect(),
            model: None,
        }
    }
}

/// Parse a JSONL persona catalog. Blank lines and `#` comments are skipped.
pub fn parse_personas(content: &str) -> Result<Vec<Persona>> {
    let mut personas: Vec<Persona> = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let persona: Persona = serde_json::from_str(line)
            .map_err(|e| Error::config(format!("persona line {}: {}", lineno + 1, e)))?;
        if persona.name.trim().is_empty() {
            return Err(Error::config(format!("persona line {}: empty name", lineno + 1)));
        }
        if personas.iter().any(|p| p.name == persona.name) {
            return Err(Error::config(format!(
                "persona line {}: duplicate persona {}",
                lineno + 1,
                persona.name
            )));
        }
        personas.push(persona);
    }
    if personas.is_empty() {
        return Err(Error::config("persona catalog is empty"));
    }
    Ok(personas)
}

pub fn load_personas(path: &Path) -> Result<Vec<Persona>> {
    let content = std::fs::read_to_string(path)?;
    let personas = parse_personas(&content)?;
    tracing::info!(count = personas.len(), "Loaded personas from {}", path.display());
    Ok(personas)
}

/// Catalog used when no persona file is given.
pub fn default_personas() -> Vec<Persona> {
    vec![
        Persona::new(
            "Planner",
            "You are a careful planner. Break problems into steps before solving them.",
            ["planning", "reasoning", "question", "terminate"],
        ),
        Persona::new(
            "Critic",
            "You are a sharp critic. Find mistakes in earlier steps and fix them.",
            ["critique", "reflect", "modify", "terminate"],
        ),
        Persona::new(
            "Analyst",
            "You are a data analyst. Verify claims with computation when you can.",
            ["reasoning", "run_python", "read_file", "summarize", "conclude", "terminate"],
        ),
    ]
}
