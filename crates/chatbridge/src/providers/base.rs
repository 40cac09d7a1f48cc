use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::models::message::Message;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// One increment of a streamed completion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatDelta {
    pub text: String,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

impl ChatDelta {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_finish_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Incremental model output, consumed once
pub type DeltaStream = BoxStream<'static, Result<ChatDelta>>;

/// Base trait for AI providers (Together, OpenAI, etc)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next message in one round trip
    async fn complete(&self, system: &str, messages: &[Message]) -> Result<(Message, Usage)>;

    /// Generate the next message as a stream of text increments
    ///
    /// Errors that happen before the first byte of the response (connection,
    /// authentication, rejected payload) are returned here rather than inside the stream.
    async fn stream(&self, system: &str, messages: &[Message]) -> Result<DeltaStream>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_usage_creation() {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        assert_eq!(usage.input_tokens, Some(10));
        assert_eq!(usage.output_tokens, Some(20));
        assert_eq!(usage.total_tokens, Some(30));
    }

    #[test]
    fn test_usage_serialization() -> Result<()> {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        let serialized = serde_json::to_string(&usage)?;
        let deserialized: Usage = serde_json::from_str(&serialized)?;
        assert_eq!(usage, deserialized);

        let json_value: serde_json::Value = serde_json::from_str(&serialized)?;
        assert_eq!(json_value["input_tokens"], json!(10));
        assert_eq!(json_value["output_tokens"], json!(20));
        assert_eq!(json_value["total_tokens"], json!(30));

        Ok(())
    }

    #[test]
    fn test_delta_builders() {
        let delta = ChatDelta::text("hi")
            .with_finish_reason("stop")
            .with_usage(Usage::new(Some(1), Some(2), Some(3)));
        assert_eq!(delta.text, "hi");
        assert_eq!(delta.finish_reason.as_deref(), Some("stop"));
        assert_eq!(delta.usage.unwrap().total_tokens, Some(3));
    }
}
