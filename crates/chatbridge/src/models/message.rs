use super::content::MessageContent;
use super::role::Role;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message to or from an LLM
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn new<C: Into<MessageContent>>(role: Role, content: C) -> Self {
        Message {
            role,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system<C: Into<MessageContent>>(content: C) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a new user message
    pub fn user<C: Into<MessageContent>>(content: C) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message
    pub fn assistant<C: Into<MessageContent>>(content: C) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn text(&self) -> String {
        self.content.to_text()
    }
}
