use std::collections::VecDeque;
use std::fmt;

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};

use crate::config::OpenAiApiConfig;
use crate::error::{parse_error_message, OpenAiApiError};
use crate::events::ChatStreamEvent;
use crate::headers::build_headers;
use crate::payload::ChatRequest;
use crate::sse::SseStreamParser;
use crate::url::normalize_chat_completions_url;

#[derive(Debug)]
pub struct OpenAiClient {
    http: Client,
    config: OpenAiApiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiApiConfig) -> Result<Self, OpenAiApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().map_err(OpenAiApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn endpoint(&self) -> String {
        normalize_chat_completions_url(&self.config.base_url)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, OpenAiApiError> {
        let headers = build_headers(&self.config)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| OpenAiApiError::InvalidHeader(format!("invalid key: {key}")))?,
                HeaderValue::from_str(&value)
                    .map_err(|_| OpenAiApiError::InvalidHeader(format!("invalid value for {key}")))?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &ChatRequest,
    ) -> Result<reqwest::RequestBuilder, OpenAiApiError> {
        if request.model.trim().is_empty() {
            return Err(OpenAiApiError::InvalidRequest(
                "model identifier must not be empty".to_owned(),
            ));
        }

        let headers = self.build_headers()?;
        let mut payload = request.clone();
        payload.stream = true;
        Ok(self
            .http
            .post(self.endpoint())
            .headers(headers)
            .json(&payload))
    }

    /// Makes one attempt at opening a streaming completion.
    ///
    /// Non-success statuses are read to the end and reported as
    /// [`OpenAiApiError::Status`]. Retrying is left to the caller.
    pub async fn open_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<ChatEventStream, OpenAiApiError> {
        let response = self.build_request(request)?.send().await?;
        let status = response.status();
        if status.is_success() {
            tracing::debug!(%status, model = %request.model, "completion stream opened");
            return Ok(ChatEventStream::from_response(response));
        }

        let body = response.text().await.unwrap_or_default();
        Err(OpenAiApiError::Status(
            status,
            parse_error_message(status, &body),
        ))
    }
}

/// Pull-based reader over the events of one streaming response.
///
/// Dropping the stream releases the underlying connection.
pub struct ChatEventStream {
    bytes: BoxStream<'static, Result<Vec<u8>, OpenAiApiError>>,
    parser: SseStreamParser,
    pending: VecDeque<ChatStreamEvent>,
    finished: bool,
    exhausted: bool,
    done: bool,
}

impl fmt::Debug for ChatEventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatEventStream")
            .field("pending", &self.pending.len())
            .field("finished", &self.finished)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl ChatEventStream {
    pub fn from_response(response: Response) -> Self {
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(OpenAiApiError::from))
            .boxed();
        Self::from_byte_stream(bytes)
    }

    /// Builds a stream over pre-recorded chunks.
    pub fn from_byte_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
        I::IntoIter: Send + 'static,
    {
        Self::from_byte_stream(stream::iter(chunks.into_iter().map(Ok)).boxed())
    }

    fn from_byte_stream(bytes: BoxStream<'static, Result<Vec<u8>, OpenAiApiError>>) -> Self {
        Self {
            bytes,
            parser: SseStreamParser::default(),
            pending: VecDeque::new(),
            finished: false,
            exhausted: false,
            done: false,
        }
    }

    /// Returns the next event, or `None` once the stream completed cleanly.
    ///
    /// An in-band `error` object, a transport failure, or a body that ends
    /// before any completion marker is an error.
    pub async fn next_event(&mut self) -> Result<Option<ChatStreamEvent>, OpenAiApiError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                match event {
                    ChatStreamEvent::Done => {
                        self.done = true;
                        self.pending.clear();
                        return Ok(None);
                    }
                    ChatStreamEvent::Error { code, message } => {
                        self.done = true;
                        self.pending.clear();
                        return Err(OpenAiApiError::StreamFailed {
                            message: message
                                .or_else(|| code.clone())
                                .unwrap_or_else(|| "server reported an error".to_owned()),
                            code,
                        });
                    }
                    ChatStreamEvent::Finished { reason } => {
                        self.finished = true;
                        return Ok(Some(ChatStreamEvent::Finished { reason }));
                    }
                    ChatStreamEvent::ContentDelta { content } => {
                        return Ok(Some(ChatStreamEvent::ContentDelta { content }));
                    }
                }
            }

            if self.done {
                return Ok(None);
            }
            if self.exhausted {
                self.done = true;
                if self.finished {
                    return Ok(None);
                }
                return Err(OpenAiApiError::StreamFailed {
                    code: None,
                    message: "response ended before the completion finished".to_owned(),
                });
            }

            match self.bytes.next().await {
                Some(Ok(chunk)) => self.pending.extend(self.parser.feed(&chunk)),
                Some(Err(error)) => {
                    self.done = true;
                    return Err(error);
                }
                None => {
                    self.exhausted = true;
                    self.pending.extend(self.parser.finish());
                }
            }
        }
    }
}
