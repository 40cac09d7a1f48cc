use anyhow::Result;
use async_trait::async_trait;

use super::base::{DeltaStream, Provider, Usage};
use super::configs::TogetherProviderConfig;
use super::openai::OpenAiProvider;
use crate::models::message::Message;

pub const TOGETHER_HOST: &str = "https://api.together.xyz";
pub const TOGETHER_MODEL: &str = "meta-llama/Llama-3-8b-chat-hf";
pub const TOGETHER_MAX_TOKENS: i32 = 1024;

/// Together AI serves an openai-compatible chat-completions API
pub struct TogetherProvider {
    inner: OpenAiProvider,
}

impl TogetherProvider {
    pub fn new(config: TogetherProviderConfig) -> Result<Self> {
        let inner = OpenAiProvider::compatible(
            config.host,
            Some(config.api_key),
            config.model,
            config.temperature,
            config.max_tokens,
        )?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl Provider for TogetherProvider {
    async fn complete(&self, system: &str, messages: &[Message]) -> Result<(Message, Usage)> {
        self.inner.complete(system, messages).await
    }

    async fn stream(&self, system: &str, messages: &[Message]) -> Result<DeltaStream> {
        self.inner.stream(system, messages).await
    }
}
