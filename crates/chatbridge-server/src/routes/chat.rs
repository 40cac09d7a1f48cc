use crate::{error::AppError, response::DataStreamResponse, state::AppState};
use anyhow::anyhow;
use axum::{body::Bytes, extract::State, routing::post, Router};
use chatbridge::{
    engine::{create_chat_engine, ChatParams, ChatResponse},
    errors::ChatError,
    models::{content::MessageContent, message::Message, role::Role},
    stream::{transcode, ParserOptions},
};
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

const MISSING_USER_MESSAGE: &str =
    "messages are required in the request body and the last message must be from the user";

// Types matching the incoming useChat JSON structure
#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    messages: Option<Vec<IncomingMessage>>,
    #[serde(default)]
    data: Option<RequestData>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    role: String,
    content: MessageContent,
}

#[derive(Debug, Default, Deserialize)]
struct RequestData {
    #[serde(default, rename = "imageUrl")]
    image_url: Option<String>,
}

/// Remove the final message, which must exist and come from the user
fn pop_user_message(messages: &mut Vec<IncomingMessage>) -> Result<IncomingMessage, ChatError> {
    match messages.pop() {
        Some(message) if message.role == "user" => Ok(message),
        _ => Err(ChatError::InvalidRequest(MISSING_USER_MESSAGE.to_string())),
    }
}

/// Plain text, or text paired with the image when one was supplied
fn convert_message_content(text: String, image_url: Option<&str>) -> MessageContent {
    match image_url {
        Some(url) if !url.is_empty() => MessageContent::text_with_image(text, url),
        _ => MessageContent::Text(text),
    }
}

fn apply_instruction_suffix(text: String, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => text + &suffix.to_lowercase(),
        None => text,
    }
}

// Convert the remaining conversation to our internal Message type
fn convert_messages(incoming: Vec<IncomingMessage>) -> Vec<Message> {
    incoming
        .into_iter()
        .filter_map(|msg| match Role::from_name(&msg.role) {
            Some(role) => Some(Message::new(role, msg.content)),
            None => {
                tracing::warn!("Unknown role: {}", msg.role);
                None
            }
        })
        .collect()
}

async fn handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<DataStreamResponse, AppError> {
    let request: ChatRequest = serde_json::from_slice(&body)?;
    let mut messages = request.messages.unwrap_or_default();
    let user_message = pop_user_message(&mut messages)?;

    let image_url = request
        .data
        .and_then(|data| data.image_url)
        .filter(|url| !url.is_empty());

    let text = apply_instruction_suffix(
        user_message.content.to_text(),
        state.chat.instruction_suffix.as_deref(),
    );
    let content = convert_message_content(text, image_url.as_deref());

    let engine =
        create_chat_engine(state.provider_config, state.chat.system_prompt.clone()).await?;

    let response = engine
        .chat(ChatParams {
            message: content,
            chat_history: convert_messages(messages),
            stream: true,
        })
        .await?;

    let ChatResponse::Stream(deltas) = response else {
        return Err(AppError::Internal(anyhow!(
            "chat engine returned a complete message for a streaming request"
        )));
    };

    let (mut parts, _data) = transcode(deltas, ParserOptions { image_url });

    // Create channel for streaming
    let (tx, rx) = mpsc::channel(100);

    // Spawn task to drive the model stream; it stops once the client goes away
    tokio::spawn(async move {
        while let Some(part) = parts.next().await {
            if tx.send(part.encode()).await.is_err() {
                tracing::debug!("client disconnected, dropping model stream");
                break;
            }
        }
    });

    Ok(DataStreamResponse::new(ReceiverStream::new(rx)))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handler))
        .with_state(state)
}
