//! Deterministic mock implementation of the `completion_provider` contract.
//!
//! This crate contains no transport logic and is intended for local runs
//! without network access and for session-level integration tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use completion_provider::{
    CompletionDelta, CompletionProvider, CompletionStream, Message, ProviderError, Role,
};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// What the next call to `send_context` should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    /// Establish and stream these fragments, then end cleanly.
    Respond(Vec<String>),
    /// Establish, stream the fragments, then fail with the message.
    RespondThenFail(Vec<String>, String),
    /// Fail establishment with the message.
    FailToConnect(String),
}

impl MockOutcome {
    pub fn respond<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Respond(fragments.into_iter().map(Into::into).collect())
    }

    pub fn fail_to_connect(message: impl Into<String>) -> Self {
        Self::FailToConnect(message.into())
    }
}

/// One call observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub model_id: String,
    pub messages: Vec<Message>,
}

/// Deterministic mock provider.
///
/// Scripted outcomes are consumed in order. Once the script runs out, the
/// provider echoes the last user message back word by word.
#[derive(Debug, Default)]
pub struct MockProvider {
    script: Mutex<VecDeque<MockOutcome>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock that plays `outcomes` before falling back to echoing.
    #[must_use]
    pub fn with_script(outcomes: impl IntoIterator<Item = MockOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_outcome(&self, outcome: MockOutcome) {
        lock_unpoisoned(&self.script).push_back(outcome);
    }

    /// Every call received so far, including failed establishments.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        lock_unpoisoned(&self.requests).len()
    }

    fn next_outcome(&self, messages: &[Message]) -> MockOutcome {
        lock_unpoisoned(&self.script)
            .pop_front()
            .unwrap_or_else(|| MockOutcome::Respond(echo_fragments(messages)))
    }
}

impl CompletionProvider for MockProvider {
    fn provider_id(&self) -> &str {
        MOCK_PROVIDER_ID
    }

    fn send_context(
        &self,
        messages: &[Message],
        model_id: &str,
    ) -> Result<CompletionStream, ProviderError> {
        lock_unpoisoned(&self.requests).push(RecordedRequest {
            model_id: model_id.to_string(),
            messages: messages.to_vec(),
        });

        match self.next_outcome(messages) {
            MockOutcome::Respond(fragments) => Ok(CompletionStream::from_fragments(fragments)),
            MockOutcome::RespondThenFail(fragments, message) => Ok(CompletionStream::from_deltas(
                fragments
                    .into_iter()
                    .map(CompletionDelta::Fragment)
                    .chain(std::iter::once(CompletionDelta::Error(ProviderError::new(
                        message,
                    )))),
            )),
            MockOutcome::FailToConnect(message) => Err(ProviderError::new(message)),
        }
    }
}

fn echo_fragments(messages: &[Message]) -> Vec<String> {
    let last_user = messages
        .iter()
        .rev()
        .find(|message| message.role == Role::User)
        .map(|message| message.content.as_str())
        .unwrap_or("");
    tokenize(&format!("You said: {last_user}"))
}

/// Splits text after each space or newline, keeping the separators.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut pending = String::new();
    for ch in text.chars() {
        pending.push(ch);
        if matches!(ch, ' ' | '\n') {
            tokens.push(std::mem::take(&mut pending));
        }
    }
    if !pending.is_empty() {
        tokens.push(pending);
    }
    tokens
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
