//! Transcoding of model output into the vercel ai data stream protocol.
//!
//! Each frame is a single line `<code>:<json>\n`:
//! - `0:` a text fragment
//! - `2:` an array of data values from the side channel
//! - `3:` an error message
//! - `d:` the finish message with reason and token usage
use futures::stream::{BoxStream, StreamExt};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, PoisonError};

use crate::providers::base::{DeltaStream, Usage};

#[derive(Debug, Clone, Default)]
pub struct ParserOptions {
    /// Image sent with the user message, echoed back as the first data value
    pub image_url: Option<String>,
}

/// Side channel of json values, interleaved with the text as data parts
///
/// Values appended while the stream runs are emitted, in append order, before
/// the next model increment is read.
#[derive(Debug, Clone, Default)]
pub struct StreamData {
    pending: Arc<Mutex<Vec<Value>>>,
}

impl StreamData {
    pub fn append(&self, value: Value) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value);
    }

    fn flush(&self) -> Option<StreamPart> {
        let values =
            std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        if values.is_empty() {
            None
        } else {
            Some(StreamPart::Data(values))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    Text(String),
    Data(Vec<Value>),
    Error(String),
    Finish { reason: String, usage: Usage },
}

impl StreamPart {
    /// Encode as one protocol line, newline included
    pub fn encode(&self) -> String {
        match self {
            StreamPart::Text(text) => format!("0:{}\n", Value::String(text.clone())),
            StreamPart::Data(values) => format!("2:{}\n", Value::Array(values.clone())),
            StreamPart::Error(message) => format!("3:{}\n", Value::String(message.clone())),
            StreamPart::Finish { reason, usage } => {
                let finish = json!({
                    "finishReason": reason,
                    "usage": {
                        "promptTokens": usage.input_tokens.unwrap_or(0),
                        "completionTokens": usage.output_tokens.unwrap_or(0)
                    }
                });
                format!("d:{}\n", finish)
            }
        }
    }
}

/// The data value announcing the image attached to the user message, `{}` without one
fn image_annotation(image_url: Option<&str>) -> Value {
    match image_url {
        Some(url) => json!({
            "type": "image_url",
            "image_url": { "url": url }
        }),
        None => json!({}),
    }
}

/// Convert a model delta stream into protocol parts plus its data side channel
///
/// Text fragments keep the order the model produced them. Whitespace before the
/// first visible text is dropped and empty fragments are skipped. A failing
/// delta ends the stream with an error part and a finish part with reason `error`.
pub fn transcode(
    response: DeltaStream,
    options: ParserOptions,
) -> (BoxStream<'static, StreamPart>, StreamData) {
    let data = StreamData::default();
    let side = data.clone();

    let parts = async_stream::stream! {
        let mut response = response;
        side.append(image_annotation(options.image_url.as_deref()));
        if let Some(part) = side.flush() {
            yield part;
        }

        let mut started = false;
        let mut finish_reason = None;
        let mut usage = Usage::default();

        while let Some(delta) = response.next().await {
            match delta {
                Ok(delta) => {
                    let text = if started {
                        delta.text.as_str()
                    } else {
                        delta.text.trim_start()
                    };
                    if !text.is_empty() {
                        started = true;
                        yield StreamPart::Text(text.to_string());
                    }
                    if delta.finish_reason.is_some() {
                        finish_reason = delta.finish_reason;
                    }
                    if let Some(delta_usage) = delta.usage {
                        usage = delta_usage;
                    }
                }
                Err(err) => {
                    tracing::error!("[chat] model stream failed: {}", err);
                    if let Some(part) = side.flush() {
                        yield part;
                    }
                    yield StreamPart::Error(err.to_string());
                    yield StreamPart::Finish { reason: "error".to_string(), usage };
                    return;
                }
            }

            if let Some(part) = side.flush() {
                yield part;
            }
        }

        // closes the assistant message's annotations
        side.append(json!({}));
        if let Some(part) = side.flush() {
            yield part;
        }
        yield StreamPart::Finish {
            reason: finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage,
        };
    };

    (Box::pin(parts), data)
}
