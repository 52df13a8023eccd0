//! Orchestrator configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists. Selected keys can be
//! overridden through `PUPPETEER_*` environment variables.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PuppeteerConfig {
    /// Fan-out and global limits.
    pub run: RunConfig,
    /// Per-path budgets.
    pub path: PathConfig,
    /// External tool use.
    pub tools: ToolsConfig,
    /// Event stream sizing.
    pub events: EventsConfig,
    /// Model collaborator.
    pub model: ModelConfig,
    /// Aggregation of path answers.
    pub arbitration: ArbitrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of reasoning paths spawned per task.
    pub paths: usize,
    /// Wall-clock limit for a whole run.
    pub global_timeout_secs: u64,
    /// How long to wait for paths after the global timeout before abandoning them.
    pub cancel_grace_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Maximum number of recorded steps per path.
    pub max_steps: usize,
    /// Elapsed-time budget per path.
    pub time_budget_secs: u64,
    /// Timeout for a single action execution.
    pub step_timeout_secs: u64,
    /// Failed attempts at one action before the path is declared failed.
    pub retry_cap: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// When false, tool actions are never offered to agents.
    pub enabled: bool,
    /// Working directory for tool execution.
    pub workspace: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Events kept for late subscribers. 0 disables replay.
    pub replay_capacity: usize,
    /// Live channel capacity per subscriber before it starts lagging.
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// "anthropic" or "openai" (any OpenAI-compatible endpoint).
    pub provider: String,
    pub name: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArbitrationStrategy {
    /// Most frequent answer wins.
    Majority,
    /// A model call combines the candidates.
    Llm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbitrationConfig {
    pub strategy: ArbitrationStrategy,
}

// ============================================================
// Defaults
// ============================================================

impl Default for RunConfig {
    fn default() -> Self {
        Self { paths: 3, global_timeout_secs: 600, cancel_grace_secs: 5 }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self { max_steps: 8, time_budget_secs: 300, step_timeout_secs: 120, retry_cap: 3 }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self { enabled: false, workspace: PathBuf::from(".") }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { replay_capacity: 10_000, channel_capacity: 1024 }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".into(),
            name: "claude-sonnet-4-20250514".into(),
            max_tokens: 4096,
            temperature: None,
            base_url: None,
            api_key_env: "ANTHROPIC_API_KEY".into(),
        }
    }
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self { strategy: ArbitrationStrategy::Majority }
    }
}

// ============================================================
// Durations
// ============================================================

impl RunConfig {
    pub fn global_timeout(&self) -> Duration {
        Duration::from_secs(self.global_timeout_secs)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(self.cancel_grace_secs)
    }
}

impl PathConfig {
    pub fn time_budget(&self) -> Duration {
        Duration::from_secs(self.time_budget_secs)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}

// ============================================================
// Loading
// ============================================================

impl PuppeteerConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} - using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} - using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Apply `PUPPETEER_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(std::env::vars())
    }

    /// Apply overrides from `(key, value)` pairs; unrelated keys are ignored.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix("PUPPETEER_") else {
                continue;
            };
            let value = value.as_ref().trim();
            match name {
                "PATHS" => self.run.paths = parse_env(name, value)?,
                "GLOBAL_TIMEOUT_SECS" => self.run.global_timeout_secs = parse_env(name, value)?,
                "MAX_STEPS" => self.path.max_steps = parse_env(name, value)?,
                "RETRY_CAP" => self.path.retry_cap = parse_env(name, value)?,
                "STEP_TIMEOUT_SECS" => self.path.step_timeout_secs = parse_env(name, value)?,
                "TOOLS_ENABLED" => self.tools.enabled = parse_env(name, value)?,
                "MODEL" => self.model.name = value.to_string(),
                "PROVIDER" => self.model.provider = value.to_string(),
                _ => tracing::debug!("Ignoring unknown override PUPPETEER_{}", name),
            }
        }
        self.validate()
    }

    /// Reject settings that would make a run unable to terminate.
    pub fn validate(&self) -> Result<()> {
        if self.run.paths == 0 {
            return Err(Error::config("run.paths must be at least 1"));
        }
        if self.run.global_timeout_secs == 0 {
            return Err(Error::config("run.global_timeout_secs must be positive"));
        }
        if self.path.max_steps == 0 {
            return Err(Error::config("path.max_steps must be at least 1"));
        }
        if self.path.retry_cap == 0 {
            return Err(Error::config("path.retry_cap must be at least 1"));
        }
        if self.path.time_budget_secs == 0 || self.path.step_timeout_secs == 0 {
            return Err(Error::config("path time budget and step timeout must be positive"));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::config(format!("invalid value for PUPPETEER_{}: {:?}", name, value)))
}
