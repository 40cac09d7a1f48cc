//! These models represent the objects passed between the HTTP surface and the LLM
//!
//! Two formats overlap here:
//! - vercel useChat messages, sent from the interface to the server
//! - openai-compatible chat messages, sent from the server to the LLM
//!
//! The content union serializes directly into the openai-compatible shape, so
//! the internal models double as the wire format for providers.
pub mod content;
pub mod message;
pub mod role;
