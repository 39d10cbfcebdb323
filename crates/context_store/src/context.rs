use completion_provider::Message;

use crate::error::ContextError;

/// Ordered conversation transcript.
///
/// Pure data: callers that mirror the transcript to disk refresh the mirror
/// after each mutation themselves. Single writer only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    messages: Vec<Message>,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Removes the last `n` messages, or nothing at all when `n` is out of bounds.
    pub fn pop_last(&mut self, n: i64) -> Result<(), ContextError> {
        if n < 1 {
            return Err(ContextError::InvalidCount { requested: n });
        }
        let len = self.messages.len();
        let count = usize::try_from(n)
            .ok()
            .filter(|count| *count <= len)
            .ok_or(ContextError::OutOfRange { requested: n, len })?;

        self.messages.truncate(len - count);
        Ok(())
    }

    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn prepend(&mut self, mut messages: Vec<Message>) {
        messages.append(&mut self.messages);
        self.messages = messages;
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
