use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

use super::base::{ChatDelta, DeltaStream, Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::sse::{SseEvent, SseParser};
use super::utils::{
    check_openai_context_length_error, create_request_payload, get_usage,
    openai_chunk_to_delta, openai_response_to_message,
};
use crate::models::message::Message;

pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const OPENAI_MODEL: &str = "gpt-4o";

/// Client for any endpoint speaking the openai chat-completions protocol
pub struct OpenAiProvider {
    client: Client,
    host: String,
    api_key: Option<String>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<i32>,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        Self::compatible(
            config.host,
            Some(config.api_key),
            config.model,
            config.temperature,
            config.max_tokens,
        )
    }

    /// Build a client for an openai-compatible host; requests are unauthenticated without a key
    pub fn compatible(
        host: String,
        api_key: Option<String>,
        model: String,
        temperature: Option<f32>,
        max_tokens: Option<i32>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self {
            client,
            host,
            api_key,
            model,
            temperature,
            max_tokens,
        })
    }

    async fn post(&self, payload: &Value) -> Result<Response> {
        let url = format!("{}/v1/chat/completions", self.host.trim_end_matches('/'));
        tracing::debug!(%url, model = %self.model, "sending chat completion request");

        let mut request = self.client.post(&url).json(payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                let body: Value = response.json().await.unwrap_or(Value::Null);
                if let Some(err) = body
                    .get("error")
                    .and_then(check_openai_context_length_error)
                {
                    return Err(err.into());
                }
                Err(anyhow!("Request failed: {}", status))
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(&self, system: &str, messages: &[Message]) -> Result<(Message, Usage)> {
        let payload = create_request_payload(
            &self.model,
            system,
            messages,
            self.temperature,
            self.max_tokens,
            false,
        );

        let response: Value = self.post(&payload).await?.json().await?;

        // Raise specific error if context length is exceeded
        if let Some(error) = response.get("error") {
            if let Some(err) = check_openai_context_length_error(error) {
                return Err(err.into());
            }
            return Err(anyhow!("OpenAI API error: {}", error));
        }

        let message = openai_response_to_message(&response)?;
        let usage = get_usage(&response).unwrap_or_default();

        Ok((message, usage))
    }

    async fn stream(&self, system: &str, messages: &[Message]) -> Result<DeltaStream> {
        let payload = create_request_payload(
            &self.model,
            system,
            messages,
            self.temperature,
            self.max_tokens,
            true,
        );

        let bytes = self.post(&payload).await?.bytes_stream();
        Ok(Box::pin(delta_stream(bytes)))
    }
}

/// Decode a chat-completions event stream into deltas, stopping at `[DONE]`
fn delta_stream<S, B>(bytes: S) -> impl Stream<Item = Result<ChatDelta>> + Send + 'static
where
    S: Stream<Item = reqwest::Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    async_stream::try_stream! {
        futures::pin_mut!(bytes);
        let mut parser = SseParser::new();
        let mut done = false;

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            for event in parser.feed(chunk.as_ref())? {
                match event {
                    SseEvent::Data(data) => {
                        let value: Value = serde_json::from_str(&data)?;
                        yield openai_chunk_to_delta(&value)?;
                    }
                    SseEvent::Done => done = true,
                }
            }
            if done {
                break;
            }
        }

        if !done {
            if let Some(SseEvent::Data(data)) = parser.flush()? {
                let value: Value = serde_json::from_str(&data)?;
                yield openai_chunk_to_delta(&value)?;
            }
        }
    }
}
