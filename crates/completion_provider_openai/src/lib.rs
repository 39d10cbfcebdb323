//! OpenAI-backed implementation of the `completion_provider` contract.
//!
//! Establishment runs to completion on the calling thread. Once the response
//! headers are in, a task on a private runtime pumps SSE events into the
//! bounded completion queue while the caller drains it.

use std::sync::Arc;
use std::time::Duration;

use completion_provider::{
    completion_channel, CompletionProvider, CompletionSender, CompletionStream, Message,
    ProviderError, ProviderInitError, STREAM_QUEUE_CAPACITY,
};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use openai_api::{
    ChatEventStream, ChatMessage, ChatRequest, ChatStreamEvent, OpenAiApiConfig, OpenAiApiError,
    OpenAiClient,
};

/// Stable provider identifier used by startup selection.
pub const OPENAI_PROVIDER_ID: &str = "openai";

/// Runtime configuration for the OpenAI provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub organization: Option<String>,
    pub connect_timeout: Option<Duration>,
}

impl OpenAiProviderConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            organization: None,
            connect_timeout: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn into_api_config(self) -> OpenAiApiConfig {
        let mut config = OpenAiApiConfig::new(self.api_key);

        if let Some(base_url) = self.base_url {
            config = config.with_base_url(base_url);
        }

        if let Some(organization) = self.organization {
            config = config.with_organization(organization);
        }

        if let Some(timeout) = self.connect_timeout {
            config = config.with_connect_timeout(timeout);
        }

        config
    }
}

trait StreamOpener: Send + Sync {
    fn open(&self, request: ChatRequest) -> BoxFuture<'static, Result<ChatEventStream, OpenAiApiError>>;
}

#[derive(Debug)]
struct DefaultStreamOpener {
    client: Arc<OpenAiClient>,
}

impl StreamOpener for DefaultStreamOpener {
    fn open(&self, request: ChatRequest) -> BoxFuture<'static, Result<ChatEventStream, OpenAiApiError>> {
        let client = Arc::clone(&self.client);
        async move { client.open_stream(&request).await }.boxed()
    }
}

/// `CompletionProvider` adapter backed by `openai_api` transport primitives.
pub struct OpenAiProvider {
    runtime: tokio::runtime::Runtime,
    opener: Box<dyn StreamOpener>,
}

impl OpenAiProvider {
    /// Creates a provider using real HTTP transport.
    pub fn new(config: OpenAiProviderConfig) -> Result<Self, ProviderInitError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderInitError::new("OpenAI API key is required"));
        }
        let client = OpenAiClient::new(config.into_api_config()).map_err(map_init_error)?;
        tracing::debug!(endpoint = %client.endpoint(), "openai provider configured");
        Self::with_opener(Box::new(DefaultStreamOpener {
            client: Arc::new(client),
        }))
    }

    fn with_opener(opener: Box<dyn StreamOpener>) -> Result<Self, ProviderInitError> {
        // One worker is enough: it only pumps the stream of the exchange in flight.
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("gptrepl-stream")
            .enable_all()
            .build()
            .map_err(|error| {
                ProviderInitError::new(format!("failed to initialize tokio runtime: {error}"))
            })?;

        Ok(Self { runtime, opener })
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider").finish_non_exhaustive()
    }
}

impl CompletionProvider for OpenAiProvider {
    fn provider_id(&self) -> &str {
        OPENAI_PROVIDER_ID
    }

    fn send_context(
        &self,
        messages: &[Message],
        model_id: &str,
    ) -> Result<CompletionStream, ProviderError> {
        let request = build_chat_request(messages, model_id);
        let events = self
            .runtime
            .block_on(self.opener.open(request))
            .map_err(map_establish_error)?;

        let (sender, stream) = completion_channel(STREAM_QUEUE_CAPACITY);
        self.runtime.spawn(pump_events(events, sender));
        Ok(stream)
    }
}

fn build_chat_request(messages: &[Message], model_id: &str) -> ChatRequest {
    ChatRequest::new(
        model_id,
        messages
            .iter()
            .map(|message| ChatMessage::new(message.role.as_str(), message.content.clone()))
            .collect(),
    )
}

/// Forwards text fragments until the response completes, fails, or the
/// consumer goes away. Exactly one terminal value is queued unless the
/// consumer is already gone.
async fn pump_events(mut events: ChatEventStream, sender: CompletionSender) {
    loop {
        match events.next_event().await {
            Ok(Some(ChatStreamEvent::ContentDelta { content })) => {
                if !sender.send_fragment(content).await {
                    tracing::debug!("completion consumer dropped; releasing response");
                    return;
                }
            }
            Ok(Some(ChatStreamEvent::Finished { reason })) => {
                tracing::debug!(reason = reason.as_str(), "completion finished");
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                sender.finish().await;
                return;
            }
            Err(error) => {
                tracing::debug!(%error, "completion stream failed");
                sender.fail(ProviderError::new(error.to_string())).await;
                return;
            }
        }
    }
}

fn map_init_error(error: OpenAiApiError) -> ProviderInitError {
    ProviderInitError::new(error.to_string())
}

fn map_establish_error(error: OpenAiApiError) -> ProviderError {
    ProviderError::new(error.to_string())
}
