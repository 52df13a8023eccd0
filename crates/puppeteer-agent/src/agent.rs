//! Agents - personas that execute actions

use crate::persona::Persona;
use crate::registry::ActionRegistry;
use puppeteer_core::{
    extract_json_object, Action, ActionKind, AgentId, Error, ModelConfig, PathId, Result, Task,
};
use puppeteer_graph::ActionGraph;
use puppeteer_llm::{LlmProvider, LlmRequest};
use puppeteer_tools::{ToolRegistry, ToolResult};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Prior step payloads are cut to this many characters in prompts.
const HISTORY_EXCERPT_CHARS: usize = 600;

/// What an agent sees when executing one step.
pub struct StepContext<'a> {
    pub task: &'a Task,
    pub path_id: &'a PathId,
    pub step_index: u64,
    /// Steps recorded so far on this path.
    pub history: &'a ActionGraph,
}

/// An agent executes actions on behalf of a path. Implementations are shared
/// read-only across all paths of a run.
#[async_trait::async_trait]
pub trait Agent: Send + Sync {
    fn id(&self) -> &AgentId;

    /// Action kinds this agent can execute.
    fn capabilities(&self) -> BTreeSet<ActionKind>;

    /// Run `action`. For termination actions the returned value is the
    /// candidate answer.
    async fn execute(&self, action: &Action, ctx: &StepContext<'_>) -> Result<Value>;
}

// ============================================================
// Catalog
// ============================================================

/// Agents in declaration order. Order matters: it is the rotation order of
/// the selection policy.
#[derive(Default)]
pub struct AgentCatalog {
    agents: Vec<Arc<dyn Agent>>,
    index: HashMap<AgentId, usize>,
}

impl AgentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, agent: Arc<dyn Agent>) -> Result<()> {
        let id = agent.id().clone();
        if self.index.contains_key(&id) {
            return Err(Error::config(format!("agent {} defined twice", id)));
        }
        self.index.insert(id, self.agents.len());
        self.agents.push(agent);
        Ok(())
    }

    pub fn get(&self, id: &AgentId) -> Result<&Arc<dyn Agent>> {
        self.index
            .get(id)
            .map(|&i| &self.agents[i])
            .ok_or_else(|| Error::unknown_agent(id.as_str()))
    }

    pub fn position(&self, id: &AgentId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Build LLM-backed agents from personas, enrolling each persona's
    /// actions in `registry`.
    pub fn from_personas(
        personas: &[Persona],
        registry: &mut ActionRegistry,
        provider: Arc<dyn LlmProvider>,
        model: &ModelConfig,
        tools: Option<Arc<ToolRegistry>>,
    ) -> Result<Self> {
        let mut catalog = Self::new();
        for persona in personas {
            let id = AgentId::new(persona.name.as_str());
            registry.enroll(id, &persona.actions)?;
            let capabilities = persona
                .actions
                .iter()
                .filter_map(|name| registry.find(name))
                .map(|a| a.required_capability())
                .collect();
            let mut agent = LlmAgent::new(persona.clone(), capabilities, provider.clone(), model);
            if let Some(tools) = &tools {
                agent = agent.with_tools(tools.clone());
            }
            catalog.add(Arc::new(agent))?;
        }
        Ok(catalog)
    }
}

// ============================================================
// LLM agent
// ============================================================

pub struct LlmAgent {
    id: AgentId,
    persona: Persona,
    capabilities: BTreeSet<ActionKind>,
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
    tools: Option<Arc<ToolRegistry>>,
}

impl LlmAgent {
    pub fn new(
        persona: Persona,
        capabilities: BTreeSet<ActionKind>,
        provider: Arc<dyn LlmProvider>,
        model: &ModelConfig,
    ) -> Self {
        Self {
            id: AgentId::new(persona.name.as_str()),
            model: persona.model.clone().unwrap_or_else(|| model.name.clone()),
            max_tokens: model.max_tokens,
            temperature: model.temperature,
            persona,
            capabilities,
            provider,
            tools: None,
        }
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    async fn ask(&self, action: &Action, prompt: String) -> Result<String> {
        let mut request = LlmRequest::prompt(
            self.model.as_str(),
            Some(self.persona.system_prompt.clone()),
            prompt,
        );
        request.max_tokens = Some(self.max_tokens);
        request.temperature = self.temperature;

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| {
                Error::action_failed(self.id.as_str(), action.name.as_str(), e.to_string())
            })?;
        let text = response.text.trim().to_string();
        if text.is_empty() {
            return Err(Error::action_failed(
                self.id.as_str(),
                action.name.as_str(),
                "model returned no text",
            ));
        }
        Ok(text)
    }

    async fn run_tool(&self, action: &Action, ctx: &StepContext<'_>) -> Result<Value> {
        let fail = |msg: String| Error::action_failed(self.id.as_str(), action.name.as_str(), msg);
        let tools = self.tools.as_ref().ok_or_else(|| fail("no tools available".into()))?;
        let spec = tools
            .spec(&action.name)
            .ok_or_else(|| fail(format!("tool {} is not installed", action.name)))?;

        let instruction = format!(
            "Call the tool `{}`: {}\nInput schema: {}\n\
             Reply with a single JSON object holding the arguments.",
            spec.name, spec.description, spec.input_schema
        );
        let reply = self.ask(action, build_prompt(ctx, action, &instruction)).await?;
        let args = extract_json_object(&reply)
            .ok_or_else(|| fail("model did not propose tool arguments".into()))?;

        debug!(agent = %self.id, tool = %spec.name, "Executing tool");
        let result = tools.execute(&spec.name, args.clone()).await;
        if result.is_error() {
            return Err(fail(result.to_content_string()));
        }
        let output = match result {
            ToolResult::Json(value) => value,
            other => Value::String(other.to_content_string()),
        };
        Ok(json!({
            "tool": spec.name,
            "args": args,
            "output": output,
        }))
    }
}

#[async_trait::async_trait]
impl Agent for LlmAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn capabilities(&self) -> BTreeSet<ActionKind> {
        self.capabilities.clone()
    }

    async fn execute(&self, action: &Action, ctx: &StepContext<'_>) -> Result<Value> {
        match action.kind {
            ActionKind::Reasoning => {
                let instruction =
                    format!("Perform the step `{}`: {}", action.name, action.description);
                let text = self.ask(action, build_prompt(ctx, action, &instruction)).await?;
                Ok(Value::String(text))
            }
            ActionKind::Tool => self.run_tool(action, ctx).await,
            ActionKind::Termination => {
                let format = ctx.task.answer_format();
                let instruction = format!(
                    "Give the final answer to the task. {}",
                    format.instruction()
                );
                let text = self.ask(action, build_prompt(ctx, action, &instruction)).await?;
                format
                    .normalize(&text)
                    .map(|answer| answer.into_value())
                    .ok_or_else(|| {
                        Error::action_failed(
                            self.id.as_str(),
                            action.name.as_str(),
                            "no usable answer in reply",
                        )
                    })
            }
        }
    }
}

fn build_prompt(ctx: &StepContext<'_>, action: &Action, instruction: &str) -> String {
    let mut prompt = format!("Task ({}): {}\n", ctx.task.kind, ctx.task.question);

    let previous: Vec<String> = ctx
        .history
        .nodes()
        .iter()
        .filter(|n| n.status.is_success())
        .map(|n| format!("- [{}] {}: {}", n.agent, n.action.name, excerpt(&n.payload)))
        .collect();
    if !previous.is_empty() {
        prompt.push_str("\nPrevious steps:\n");
        prompt.push_str(&previous.join("\n"));
        prompt.push('\n');
    }

    prompt.push_str(&format!("\nStep {} ({}). {}\n", ctx.step_index + 1, action.kind, instruction));
    prompt
}

fn excerpt(payload: &Value) -> String {
    let text = match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() > HISTORY_EXCERPT_CHARS {
        let head: String = text.chars().take(HISTORY_EXCERPT_CHARS).collect();
        format!("{}...", head)
    } else {
        text
    }
}
