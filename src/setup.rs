//! Building an orchestrator from configuration

use puppeteer_agent::{
    ActionRegistry, AgentCatalog, Arbitrator, LlmArbitrator, MajorityVote, Orchestrator, Persona,
};
use puppeteer_core::{ArbitrationStrategy, Error, ModelConfig, PuppeteerConfig, Result};
use puppeteer_llm::{AnthropicProvider, LlmProvider, MockProvider, OpenAiProvider};
use std::sync::Arc;
use tracing::info;

/// Model provider named by `model.provider`. With `mock_reply` set, a
/// scripted offline provider answering `mock_reply` is used instead.
pub fn build_provider(
    model: &ModelConfig,
    mock_reply: Option<&str>,
) -> Result<Arc<dyn LlmProvider>> {
    if let Some(reply) = mock_reply {
        info!("Using mock provider");
        return Ok(Arc::new(MockProvider::text(reply)));
    }

    let api_key = std::env::var(&model.api_key_env)
        .map_err(|_| Error::config(format!("{} not set", model.api_key_env)))?;

    let provider: Arc<dyn LlmProvider> = match model.provider.as_str() {
        "anthropic" => {
            let mut provider = AnthropicProvider::new(api_key);
            if let Some(url) = &model.base_url {
                provider = provider.with_base_url(url.as_str());
            }
            Arc::new(provider)
        }
        "openai" => {
            let mut provider = OpenAiProvider::new(api_key);
            if let Some(url) = &model.base_url {
                provider = provider.with_base_url(url.as_str());
            }
            Arc::new(provider)
        }
        other => return Err(Error::config(format!("unknown model provider: {}", other))),
    };
    info!(provider = %model.provider, model = %model.name, "Model provider ready");
    Ok(provider)
}

/// Orchestrator with LLM-backed agents, one per persona.
pub fn build_orchestrator(
    config: PuppeteerConfig,
    personas: &[Persona],
    provider: Arc<dyn LlmProvider>,
) -> Result<Orchestrator> {
    let mut registry = ActionRegistry::builtin();
    let tools = config
        .tools
        .enabled
        .then(|| Arc::new(puppeteer_tools::create_default_registry(&config.tools.workspace)));
    let catalog = AgentCatalog::from_personas(
        personas,
        &mut registry,
        provider.clone(),
        &config.model,
        tools,
    )?;

    let arbitrator: Arc<dyn Arbitrator> = match config.arbitration.strategy {
        ArbitrationStrategy::Majority => Arc::new(MajorityVote),
        ArbitrationStrategy::Llm => Arc::new(LlmArbitrator::new(provider, &config.model)),
    };
    info!(
        agents = catalog.len(),
        paths = config.run.paths,
        arbitrator = arbitrator.name(),
        tools = config.tools.enabled,
        "Orchestrator ready"
    );
    Ok(Orchestrator::new(config, registry, catalog).with_arbitrator(arbitrator))
}
