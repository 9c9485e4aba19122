//! LLM client factory.
//!
//! Centralizes provider selection and credential lookup.

use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{AskError, Result};
use crate::llm::ollama::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};
use crate::llm::openai::{DEFAULT_GROQ_MODEL, DEFAULT_OPENAI_MODEL};
use crate::llm::{
    LlmClient, LlmProvider, MockLlmClient, OllamaClient, OllamaConfig, OpenAiClient, OpenAiConfig,
};

const AUTO: &str = "auto";

/// Picks the provider to use.
///
/// An explicit provider (from config, or `LLM_PROVIDER` when config says
/// "auto") wins if its credential is available. Otherwise providers are
/// tried in order: `GROQ_API_KEY`, `OPENAI_API_KEY`, `OLLAMA_BASE_URL`.
pub fn resolve_provider(config: &LlmConfig) -> Result<LlmProvider> {
    resolve_provider_with(config, |name| std::env::var(name).ok())
}

fn resolve_provider_with(
    config: &LlmConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<LlmProvider> {
    let explicit = if config.provider.eq_ignore_ascii_case(AUTO) {
        env("LLM_PROVIDER").filter(|p| !p.eq_ignore_ascii_case(AUTO))
    } else {
        Some(config.provider.clone())
    };

    if let Some(name) = explicit {
        let provider: LlmProvider = name.parse().map_err(AskError::config)?;
        if has_credentials(provider, &env) {
            return Ok(provider);
        }
        warn!(provider = %provider, "Configured LLM provider has no credentials, probing others");
    }

    for provider in [LlmProvider::Groq, LlmProvider::OpenAi] {
        if has_credentials(provider, &env) {
            debug!(provider = %provider, "Detected LLM provider");
            return Ok(provider);
        }
    }
    if env("OLLAMA_BASE_URL").is_some() {
        return Ok(LlmProvider::Ollama);
    }

    Err(AskError::llm(
        "No LLM provider configured. Set GROQ_API_KEY, OPENAI_API_KEY or OLLAMA_BASE_URL, or use --llm mock.",
    ))
}

fn has_credentials(provider: LlmProvider, env: &impl Fn(&str) -> Option<String>) -> bool {
    match provider {
        LlmProvider::Groq => env("GROQ_API_KEY").is_some_and(|k| !k.is_empty()),
        LlmProvider::OpenAi => env("OPENAI_API_KEY").is_some_and(|k| !k.is_empty()),
        LlmProvider::Ollama | LlmProvider::Mock => true,
    }
}

/// Creates a client for `provider` using settings from `config`.
pub fn create_client(provider: LlmProvider, config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    match provider {
        LlmProvider::OpenAi => {
            let key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| AskError::llm("No API key configured. Set OPENAI_API_KEY."))?;
            let model = config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
            let mut client_config =
                OpenAiConfig::new(key, model).with_sampling(config.temperature, config.max_tokens);
            if let Some(url) = &config.base_url {
                client_config = client_config.with_base_url(url);
            }
            Ok(Box::new(OpenAiClient::new(client_config)?))
        }
        LlmProvider::Groq => {
            let key = std::env::var("GROQ_API_KEY")
                .map_err(|_| AskError::llm("No API key configured. Set GROQ_API_KEY."))?;
            let model = config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string());
            let mut client_config =
                OpenAiConfig::groq(key, model).with_sampling(config.temperature, config.max_tokens);
            if let Some(url) = &config.base_url {
                client_config = client_config.with_base_url(url);
            }
            Ok(Box::new(OpenAiClient::new(client_config)?))
        }
        LlmProvider::Ollama => {
            let url = config
                .base_url
                .clone()
                .or_else(|| std::env::var("OLLAMA_BASE_URL").ok())
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
            let model = config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string());
            Ok(Box::new(OllamaClient::new(
                OllamaConfig::new(model)
                    .with_url(url)
                    .with_temperature(config.temperature),
            )?))
        }
        LlmProvider::Mock => Ok(Box::new(MockLlmClient::new())),
    }
}
