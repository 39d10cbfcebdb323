//! Minimal provider-neutral contract for streaming one chat completion.
//!
//! This crate defines the transcript message types shared by every layer, the
//! pull-based [`CompletionStream`] handed from a producer task to the session
//! thread, and the [`CompletionProvider`] trait implemented by transports. It
//! excludes request encoding, authentication and the session loop.

pub mod retry;

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Queue capacity between a stream producer and the draining session thread.
pub const STREAM_QUEUE_CAPACITY: usize = 32;

/// Closed set of transcript roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "system" => Self::System,
            "user" => Self::User,
            "assistant" => Self::Assistant,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transcript entry, exactly as sent to the model and persisted to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Error returned while constructing/configuring a provider before any exchange starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderInitError {}

/// Failure to establish an exchange, or a failure reported mid-stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    message: String,
}

impl ProviderError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderError {}

impl From<String> for ProviderError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// One value pulled from a completion stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionDelta {
    Fragment(String),
    End,
    Error(ProviderError),
}

impl CompletionDelta {
    /// Returns true when this value ends the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End | Self::Error(_))
    }
}

/// Creates a bounded producer/consumer pair for one exchange.
#[must_use]
pub fn completion_channel(capacity: usize) -> (CompletionSender, CompletionStream) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        CompletionSender { sender },
        CompletionStream {
            receiver,
            finished: false,
        },
    )
}

/// Producer half of a completion stream.
///
/// `finish` and `fail` consume the sender, so at most one terminal value is
/// ever queued.
#[derive(Debug)]
pub struct CompletionSender {
    sender: mpsc::Sender<CompletionDelta>,
}

impl CompletionSender {
    /// Queues one fragment. Returns false once the consumer has gone away.
    pub async fn send_fragment(&self, text: impl Into<String>) -> bool {
        self.sender
            .send(CompletionDelta::Fragment(text.into()))
            .await
            .is_ok()
    }

    pub async fn finish(self) {
        if self.sender.send(CompletionDelta::End).await.is_err() {
            tracing::debug!("completion consumer dropped before end-of-stream");
        }
    }

    pub async fn fail(self, error: ProviderError) {
        if self.sender.send(CompletionDelta::Error(error)).await.is_err() {
            tracing::debug!("completion consumer dropped before stream error");
        }
    }
}

/// Lazy, finite, single-consumer sequence of completion deltas.
///
/// Iteration blocks on the queue and must not happen inside an async runtime.
/// The last item yielded is always terminal; a producer that disappears
/// without a terminal value surfaces as [`CompletionDelta::Error`].
#[derive(Debug)]
pub struct CompletionStream {
    receiver: mpsc::Receiver<CompletionDelta>,
    finished: bool,
}

impl CompletionStream {
    /// Builds an already-filled stream. An [`CompletionDelta::End`] is appended
    /// when `deltas` carries no terminal value; anything after the first
    /// terminal value is dropped.
    #[must_use]
    pub fn from_deltas(deltas: impl IntoIterator<Item = CompletionDelta>) -> Self {
        let mut queued = Vec::new();
        for delta in deltas {
            let terminal = delta.is_terminal();
            queued.push(delta);
            if terminal {
                break;
            }
        }
        if !queued.last().is_some_and(CompletionDelta::is_terminal) {
            queued.push(CompletionDelta::End);
        }

        let (sender, receiver) = mpsc::channel(queued.len());
        for delta in queued {
            // Capacity equals the number of queued values.
            let _ = sender.try_send(delta);
        }

        Self {
            receiver,
            finished: false,
        }
    }

    /// Convenience for a successful stream made of text fragments.
    #[must_use]
    pub fn from_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_deltas(
            fragments
                .into_iter()
                .map(|fragment| CompletionDelta::Fragment(fragment.into())),
        )
    }

    /// Drains the stream, handing each fragment to `on_fragment` in arrival
    /// order, and returns the concatenated text. A stream error discards the
    /// partial text.
    pub fn drain_with<F>(self, mut on_fragment: F) -> Result<String, ProviderError>
    where
        F: FnMut(&str),
    {
        let mut collected = String::new();
        for delta in self {
            match delta {
                CompletionDelta::Fragment(text) => {
                    on_fragment(&text);
                    collected.push_str(&text);
                }
                CompletionDelta::End => break,
                CompletionDelta::Error(error) => return Err(error),
            }
        }
        Ok(collected)
    }
}

impl Iterator for CompletionStream {
    type Item = CompletionDelta;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.receiver.blocking_recv() {
            Some(delta) => {
                if delta.is_terminal() {
                    self.finished = true;
                    self.receiver.close();
                }
                Some(delta)
            }
            None => {
                self.finished = true;
                Some(CompletionDelta::Error(ProviderError::new(
                    "completion stream closed without a terminal marker",
                )))
            }
        }
    }
}

/// Transport interface for one exchange with a remote completion service.
pub trait CompletionProvider: Send + Sync + 'static {
    /// Stable identifier used in logs and startup selection.
    fn provider_id(&self) -> &str;

    /// Sends the whole transcript for `model_id`.
    ///
    /// Errors returned here mean the exchange was never established and may be
    /// retried. Errors carried inside the returned stream must not be retried.
    fn send_context(
        &self,
        messages: &[Message],
        model_id: &str,
    ) -> Result<CompletionStream, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::{
        completion_channel, CompletionDelta, CompletionStream, Message, ProviderError,
        ProviderInitError, Role,
    };

    #[test]
    fn role_parse_accepts_only_closed_set() {
        assert_eq!(Role::parse("system"), Some(Role::System));
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("assistant"), Some(Role::Assistant));
        assert_eq!(Role::parse("narrator"), None);
        assert_eq!(Role::parse("User"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn message_serializes_role_in_lowercase() {
        let value = serde_json::to_value(Message::assistant("hi")).expect("serialize message");
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["content"], "hi");
    }

    #[test]
    fn stream_from_fragments_yields_fragments_then_end() {
        let deltas: Vec<_> = CompletionStream::from_fragments(["abc ", "def"]).collect();
        assert_eq!(
            deltas,
            vec![
                CompletionDelta::Fragment("abc ".to_string()),
                CompletionDelta::Fragment("def".to_string()),
                CompletionDelta::End,
            ]
        );
    }

    #[test]
    fn stream_stops_after_first_terminal_value() {
        let stream = CompletionStream::from_deltas([
            CompletionDelta::Fragment("a".to_string()),
            CompletionDelta::Error(ProviderError::new("boom")),
            CompletionDelta::Fragment("ignored".to_string()),
        ]);
        let deltas: Vec<_> = stream.collect();
        assert_eq!(deltas.len(), 2);
        assert!(deltas[1].is_terminal());
    }

    #[test]
    fn drain_concatenates_fragments_in_order() {
        let mut seen = Vec::new();
        let text = CompletionStream::from_fragments(["abc ", "def"])
            .drain_with(|fragment| seen.push(fragment.to_string()))
            .expect("stream should drain");
        assert_eq!(text, "abc def");
        assert_eq!(seen, vec!["abc ".to_string(), "def".to_string()]);
    }

    #[test]
    fn drain_discards_partial_text_on_error() {
        let stream = CompletionStream::from_deltas([
            CompletionDelta::Fragment("partial".to_string()),
            CompletionDelta::Error(ProviderError::new("connection reset")),
        ]);
        let error = stream
            .drain_with(|_| {})
            .expect_err("mid-stream error should fail the drain");
        assert_eq!(error.message(), "connection reset");
    }

    #[test]
    fn dropped_producer_without_terminal_surfaces_error() {
        let (sender, stream) = completion_channel(4);
        drop(sender);
        let deltas: Vec<_> = stream.collect();
        assert_eq!(deltas.len(), 1);
        assert!(matches!(
            &deltas[0],
            CompletionDelta::Error(error) if error.message().contains("without a terminal marker")
        ));
    }

    #[test]
    fn provider_init_error_preserves_message() {
        let error = ProviderInitError::new("missing api key");
        assert_eq!(error.message(), "missing api key");
        assert_eq!(error.to_string(), "missing api key");
    }
}
