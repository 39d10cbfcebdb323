//! Send-with-retry and stream draining for one exchange.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use completion_provider::retry::{retry_establish, Backoff};
use completion_provider::{CompletionProvider, Message};

use crate::error::ReplError;

type Sleeper = Box<dyn FnMut(Duration)>;

/// Wraps a provider with the establishment retry policy.
///
/// Only establishment is retried. Once a stream exists, its error is final.
pub struct CompletionClient {
    provider: Arc<dyn CompletionProvider>,
    max_retries: u32,
    sleeper: Sleeper,
    fixed_jitter: Option<f64>,
}

impl CompletionClient {
    pub fn new(provider: Arc<dyn CompletionProvider>, max_retries: u32) -> Self {
        Self {
            provider,
            max_retries,
            sleeper: Box::new(std::thread::sleep),
            fixed_jitter: None,
        }
    }

    /// Replaces the wall-clock sleep between attempts.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: impl FnMut(Duration) + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Uses a fixed jitter instead of a random one.
    #[must_use]
    pub fn with_fixed_jitter(mut self, jitter_secs: f64) -> Self {
        self.fixed_jitter = Some(jitter_secs);
        self
    }

    /// Sends `messages` to `model_id`, hands every fragment to `on_fragment`
    /// as it arrives, and returns the full response text.
    pub fn send_and_collect<F>(
        &mut self,
        messages: &[Message],
        model_id: &str,
        on_fragment: F,
    ) -> Result<String, ReplError>
    where
        F: FnMut(&str),
    {
        let mut backoff = match self.fixed_jitter {
            Some(jitter_secs) => Backoff::with_jitter(move || jitter_secs),
            None => Backoff::new(),
        };
        let provider = Arc::clone(&self.provider);

        let (stream, attempts) = retry_establish(
            self.max_retries,
            &mut backoff,
            |_| provider.send_context(messages, model_id),
            &mut self.sleeper,
        )
        .map_err(|exhausted| ReplError::Network {
            attempts: exhausted.attempts,
            source: exhausted.last_error,
        })?;

        tracing::debug!(
            provider = provider.provider_id(),
            model = model_id,
            attempts,
            "completion stream established"
        );
        stream.drain_with(on_fragment).map_err(ReplError::Stream)
    }
}

impl fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionClient")
            .field("provider", &self.provider.provider_id())
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}
