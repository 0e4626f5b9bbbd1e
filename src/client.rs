//! Chat-completion client and the backend seam the batch machinery runs on.

use crate::config::ClientConfig;
use crate::response::ChatResponse;
use crate::retry::{self, RetryPolicy};
use crate::transport::HttpTransport;
use crate::types::Message;
use crate::{BoxStream, Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use tracing::debug;
use url::Url;

/// One logical request/response exchange against a completion endpoint.
///
/// This is the seam between the request machinery and everything above it:
/// the retry unit and the batch driver only ever see this trait, so tests
/// substitute scripted backends and the HTTP client stays out of the loop.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Perform exactly one attempt for the given conversation.
    async fn complete(&self, messages: &[Message]) -> Result<ChatResponse>;
}

/// Client for one OpenAI-compatible chat-completion endpoint.
pub struct ChatClient {
    config: ClientConfig,
    transport: HttpTransport,
    chat_url: Url,
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let chat_url = config.chat_url()?;
        Ok(Self {
            transport: HttpTransport::new()?,
            config,
            chat_url,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn payload(&self, messages: &[Message], stream: bool) -> Result<serde_json::Value> {
        let mut body = self.config.options.clone();
        body.insert("model".into(), self.config.model.clone().into());
        body.insert("messages".into(), serde_json::to_value(messages)?);
        if stream {
            body.insert("stream".into(), true.into());
        }
        Ok(serde_json::Value::Object(body))
    }

    /// Perform a single chat completion (one attempt, no retry).
    ///
    /// Non-2xx statuses and bodies carrying an error envelope both come back
    /// as errors; both are retryable from the retry unit's point of view.
    pub async fn complete(&self, messages: &[Message]) -> Result<ChatResponse> {
        let body = self.payload(messages, false)?;
        let resp = self
            .transport
            .post_json(&self.chat_url, self.config.api_key.as_deref(), &body)
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        if !parsed.is_valid() {
            return Err(Error::invalid_response(
                parsed.error_message().unwrap_or("unspecified error"),
            ));
        }
        debug!(
            model = self.config.model.as_str(),
            finish_reason = parsed.finish_reason().unwrap_or(""),
            "chat completion succeeded"
        );
        Ok(parsed)
    }

    /// Perform a chat completion through the bounded-retry unit.
    pub async fn complete_with_retry(
        &self,
        messages: &[Message],
        policy: &RetryPolicy,
    ) -> Result<ChatResponse> {
        retry::execute(self, messages, policy).await
    }

    /// Stream assistant content deltas for one completion.
    ///
    /// The stream is finite: it ends at the endpoint's `[DONE]` marker or
    /// when the connection closes. Dropping the stream cancels the request;
    /// the connection is released with it.
    pub async fn complete_stream(&self, messages: &[Message]) -> Result<BoxStream<'static, String>> {
        let body = self.payload(messages, true)?;
        let resp = self
            .transport
            .post_json(&self.chat_url, self.config.api_key.as_deref(), &body)
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                message,
            });
        }

        let bytes: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>> =
            Box::pin(resp.bytes_stream());
        Ok(Box::pin(futures::stream::unfold(
            SseState {
                inner: bytes,
                buf: String::new(),
                pending: VecDeque::new(),
                done: false,
            },
            |mut state| async move {
                loop {
                    if let Some(item) = state.pending.pop_front() {
                        return Some((item, state));
                    }
                    if state.done {
                        return None;
                    }
                    match state.inner.next().await {
                        None => state.done = true,
                        Some(Err(e)) => {
                            state.done = true;
                            return Some((Err(Error::Transport(e)), state));
                        }
                        Some(Ok(chunk)) => {
                            state.buf.push_str(&String::from_utf8_lossy(&chunk));
                            state.drain_lines();
                        }
                    }
                }
            },
        )))
    }
}

#[async_trait]
impl CompletionBackend for ChatClient {
    async fn complete(&self, messages: &[Message]) -> Result<ChatResponse> {
        ChatClient::complete(self, messages).await
    }
}

struct SseState {
    inner: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buf: String,
    pending: VecDeque<Result<String>>,
    done: bool,
}

impl SseState {
    /// Consume complete SSE lines from the buffer, queueing content deltas.
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            let line = line.trim();
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data == "[DONE]" {
                self.done = true;
                return;
            }
            if let Ok(event) = serde_json::from_str::<serde_json::Value>(data) {
                if let Some(delta) = event["choices"][0]["delta"]["content"].as_str() {
                    self.pending.push_back(Ok(delta.to_string()));
                }
            }
        }
    }
}
