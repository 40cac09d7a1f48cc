use anyhow::Result;

use crate::models::content::MessageContent;
use crate::models::message::Message;
use crate::providers::base::{DeltaStream, Provider, Usage};
use crate::providers::configs::ProviderConfig;
use crate::providers::factory;

/// Arguments for a single chat turn
pub struct ChatParams {
    pub message: MessageContent,
    pub chat_history: Vec<Message>,
    pub stream: bool,
}

pub enum ChatResponse {
    Stream(DeltaStream),
    Message(Message, Usage),
}

/// ChatEngine pairs a provider with a system prompt and runs conversation turns
pub struct ChatEngine {
    provider: Box<dyn Provider>,
    system_prompt: String,
}

impl ChatEngine {
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self {
            provider,
            system_prompt: String::new(),
        }
    }

    pub fn with_system_prompt<S: Into<String>>(mut self, system_prompt: S) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Send the new user message after the history and return the reply
    ///
    /// Provider errors are returned as-is.
    pub async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        let mut messages = params.chat_history;
        messages.push(Message::user(params.message));

        if params.stream {
            let stream = self.provider.stream(&self.system_prompt, &messages).await?;
            Ok(ChatResponse::Stream(stream))
        } else {
            let (message, usage) = self
                .provider
                .complete(&self.system_prompt, &messages)
                .await?;
            Ok(ChatResponse::Message(message, usage))
        }
    }
}

/// Build a chat engine over a freshly constructed provider client
pub async fn create_chat_engine(
    config: ProviderConfig,
    system_prompt: Option<String>,
) -> Result<ChatEngine> {
    let provider = factory::get_provider(config)?;
    let engine = ChatEngine::new(provider);
    Ok(match system_prompt {
        Some(prompt) => engine.with_system_prompt(prompt),
        None => engine,
    })
}
