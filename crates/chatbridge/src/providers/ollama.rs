use anyhow::Result;
use async_trait::async_trait;

use super::base::{DeltaStream, Provider, Usage};
use super::configs::OllamaProviderConfig;
use super::openai::OpenAiProvider;
use crate::models::message::Message;

pub const OLLAMA_HOST: &str = "http://localhost:11434";
pub const OLLAMA_MODEL: &str = "qwen2.5";

/// Local ollama server through its openai-compatible endpoint, no credential needed
pub struct OllamaProvider {
    inner: OpenAiProvider,
}

impl OllamaProvider {
    pub fn new(config: OllamaProviderConfig) -> Result<Self> {
        let inner = OpenAiProvider::compatible(
            config.host,
            None,
            config.model,
            config.temperature,
            config.max_tokens,
        )?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(&self, system: &str, messages: &[Message]) -> Result<(Message, Usage)> {
        self.inner.complete(system, messages).await
    }

    async fn stream(&self, system: &str, messages: &[Message]) -> Result<DeltaStream> {
        self.inner.stream(system, messages).await
    }
}
