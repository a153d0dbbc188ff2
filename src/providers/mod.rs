// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Language model providers.
//!
//! The assistant only needs one thing from a model: a system prompt and a user
//! message in, reply text out. [`CompletionProvider`] captures exactly that.
//! [`openai::OpenAIProvider`] implements it for OpenAI, Ollama and any
//! OpenAI-compatible chat completions API.
//!
//! ```rust,ignore
//! use whistle_gateway::providers::{create_provider, ModelParams};
//!
//! let provider = create_provider(&config.model)?;
//! let reply = provider.complete(&system_prompt, "find burgers near me", &ModelParams::default()).await?;
//! ```

pub mod openai;

pub use openai::OpenAIProvider;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ModelConfig;
use crate::error::ProviderError;

/// Sampling parameters for one completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ModelParams {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            temperature: Some(config.temperature),
            max_tokens: Some(config.max_tokens),
        }
    }
}

/// Opaque text completion: prompt in, text out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
        params: &ModelParams,
    ) -> Result<String, ProviderError>;
}

/// Shared provider handle.
pub type SharedProvider = Arc<dyn CompletionProvider>;

/// Supported provider types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    /// OpenAI GPT models
    OpenAI,
    /// Ollama local models
    Ollama,
    /// Any OpenAI-compatible API
    OpenAICompatible,
}

impl ProviderType {
    /// Get the default model for this provider.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAI => "gpt-4o-mini",
            Self::Ollama => "llama3.2",
            Self::OpenAICompatible => "gpt-4o-mini",
        }
    }

    /// Get the default base URL for this provider.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAI => openai::OPENAI_BASE_URL,
            Self::Ollama => openai::OLLAMA_BASE_URL,
            Self::OpenAICompatible => openai::OPENAI_BASE_URL,
        }
    }

    /// Check if this provider requires an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI)
    }
}

/// Error type for parsing a provider type from a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseProviderTypeError;

impl std::fmt::Display for ParseProviderTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid provider type")
    }
}

impl std::error::Error for ParseProviderTypeError {}

impl std::str::FromStr for ProviderType {
    type Err = ParseProviderTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "gpt" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "openai-compatible" | "openai_compatible" => Ok(Self::OpenAICompatible),
            _ => Err(ParseProviderTypeError),
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAI => write!(f, "OpenAI"),
            Self::Ollama => write!(f, "Ollama"),
            Self::OpenAICompatible => write!(f, "OpenAI-Compatible"),
        }
    }
}

/// Create a provider from resolved model settings.
///
/// # Errors
///
/// Returns [`ProviderError::NotConfigured`] for an unknown provider name, a
/// missing API key where one is required, or a missing base URL for a
/// generic OpenAI-compatible endpoint.
pub fn create_provider(config: &ModelConfig) -> Result<SharedProvider, ProviderError> {
    let provider_type: ProviderType = config.provider.parse().map_err(|_| {
        ProviderError::NotConfigured(format!("Unknown provider: {}", config.provider))
    })?;

    let model = config
        .model
        .clone()
        .unwrap_or_else(|| provider_type.default_model().to_string());

    let api_key = config.api_key.clone().filter(|k| !k.is_empty());
    if provider_type.requires_api_key() && api_key.is_none() {
        return Err(ProviderError::NotConfigured(format!(
            "API key required for {}",
            provider_type
        )));
    }

    let base_url = match (provider_type, config.base_url.clone()) {
        (_, Some(url)) => url,
        (ProviderType::OpenAICompatible, None) => {
            return Err(ProviderError::NotConfigured(
                "base_url required for OpenAI-Compatible".to_string(),
            ))
        }
        (other, None) => other.default_base_url().to_string(),
    };

    let provider = OpenAIProvider::new(api_key, model, base_url, config.timeout())?;
    Ok(Arc::new(provider))
}
