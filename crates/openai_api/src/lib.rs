//! Transport-only client primitives for OpenAI-compatible chat completions.
//!
//! This crate owns request building, response status handling and SSE parsing
//! for the streaming `chat/completions` endpoint. It has no retry policy and
//! no knowledge of the interactive session; callers decide what to do with a
//! failed establishment.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod sse;
pub mod url;

pub use client::{ChatEventStream, OpenAiClient};
pub use config::OpenAiApiConfig;
pub use error::OpenAiApiError;
pub use events::{ChatStreamEvent, FinishReason};
pub use payload::{ChatMessage, ChatRequest};
pub use sse::SseStreamParser;
pub use url::normalize_chat_completions_url;
