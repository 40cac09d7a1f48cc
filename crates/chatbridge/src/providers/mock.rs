use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream;
use std::sync::{Arc, Mutex};

use crate::models::message::Message;
use crate::providers::base::{ChatDelta, DeltaStream, Provider, Usage};

/// A mock provider that replays pre-configured deltas, or fails every call
pub struct MockProvider {
    deltas: Vec<Result<ChatDelta, String>>,
    failure: Option<String>,
    calls: CallLog,
}

/// System prompt and messages of every call received
pub type CallLog = Arc<Mutex<Vec<(String, Vec<Message>)>>>;

impl MockProvider {
    pub fn new(deltas: Vec<Result<ChatDelta, String>>) -> Self {
        Self {
            deltas,
            failure: None,
            calls: CallLog::default(),
        }
    }

    pub fn failing<S: Into<String>>(message: S) -> Self {
        Self {
            deltas: Vec::new(),
            failure: Some(message.into()),
            calls: CallLog::default(),
        }
    }

    /// Handle on the call log, usable after the provider is boxed away
    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    fn record(&self, system: &str, messages: &[Message]) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), messages.to_vec()));
        match &self.failure {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, system: &str, messages: &[Message]) -> Result<(Message, Usage)> {
        self.record(system, messages)?;
        let text: String = self
            .deltas
            .iter()
            .filter_map(|delta| delta.as_ref().ok())
            .map(|delta| delta.text.as_str())
            .collect();
        Ok((Message::assistant(text), Usage::default()))
    }

    async fn stream(&self, system: &str, messages: &[Message]) -> Result<DeltaStream> {
        self.record(system, messages)?;
        let deltas: Vec<Result<ChatDelta>> = self
            .deltas
            .iter()
            .cloned()
            .map(|delta| delta.map_err(|e| anyhow!(e)))
            .collect();
        Ok(Box::pin(stream::iter(deltas)))
    }
}
