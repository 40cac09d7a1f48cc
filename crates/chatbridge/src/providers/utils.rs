use anyhow::{anyhow, Result};
use serde_json::{json, Map, Value};

use super::base::{ChatDelta, Usage};
use crate::models::message::Message;

/// Convert internal messages to the openai chat-completions message list
///   the system prompt, when present, is sent as the leading system message
pub fn messages_to_openai_spec(system: &str, messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::with_capacity(messages.len() + 1);
    if !system.is_empty() {
        messages_spec.push(json!({
            "role": "system",
            "content": system
        }));
    }

    for message in messages {
        messages_spec.push(json!({
            "role": message.role,
            "content": message.content,
        }));
    }

    messages_spec
}

/// Build the chat-completions payload shared by every openai-compatible provider
pub fn create_request_payload(
    model: &str,
    system: &str,
    messages: &[Message],
    temperature: Option<f32>,
    max_tokens: Option<i32>,
    stream: bool,
) -> Value {
    let mut payload = Map::new();
    payload.insert("model".to_string(), json!(model));
    payload.insert(
        "messages".to_string(),
        json!(messages_to_openai_spec(system, messages)),
    );

    if let Some(temp) = temperature {
        payload.insert("temperature".to_string(), json!(temp));
    }
    if let Some(tokens) = max_tokens {
        payload.insert("max_tokens".to_string(), json!(tokens));
    }
    if stream {
        payload.insert("stream".to_string(), json!(true));
    }

    Value::Object(payload)
}

/// Convert an openai chat-completions response to an assistant message
pub fn openai_response_to_message(response: &Value) -> Result<Message> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| anyhow!("No choices in response"))?;

    let text = original
        .get("content")
        .and_then(|content| content.as_str())
        .unwrap_or_default();

    Ok(Message::assistant(text))
}

/// Convert one streamed chat-completions chunk to a delta
///
/// Chunks without a first choice (usage-only trailers) yield an empty delta
/// that still carries the usage.
pub fn openai_chunk_to_delta(chunk: &Value) -> Result<ChatDelta> {
    if let Some(error) = chunk.get("error") {
        if let Some(err) = check_openai_context_length_error(error) {
            return Err(err.into());
        }
        return Err(anyhow!("Provider stream error: {}", error));
    }

    let choice = chunk.get("choices").and_then(|choices| choices.get(0));
    let text = choice
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|content| content.as_str())
        .unwrap_or_default();
    let finish_reason = choice
        .and_then(|choice| choice.get("finish_reason"))
        .and_then(|reason| reason.as_str())
        .map(String::from);

    Ok(ChatDelta {
        text: text.to_string(),
        finish_reason,
        usage: get_usage(chunk),
    })
}

/// Read token usage from a response or chunk, None when absent or null
pub fn get_usage(data: &Value) -> Option<Usage> {
    let usage = data.get("usage").filter(|usage| usage.is_object())?;

    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(|v| v.as_i64())
        .and_then(|v| i32::try_from(v).ok());

    let output_tokens = usage
        .get("completion_tokens")
        .and_then(|v| v.as_i64())
        .and_then(|v| i32::try_from(v).ok());

    let total_tokens = usage
        .get("total_tokens")
        .and_then(|v| v.as_i64())
        .and_then(|v| i32::try_from(v).ok())
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => input.checked_add(output),
            _ => None,
        });

    Some(Usage::new(input_tokens, output_tokens, total_tokens))
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}
