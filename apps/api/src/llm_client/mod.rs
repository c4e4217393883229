//! Anthropic Messages API access. Every model call in cvpatch goes through
//! `LlmClient`, consumed by the rewrite pipeline as a `TextGenerator`.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub mod partial_json;
pub mod prompts;
pub mod sse;

use partial_json::parse_partial;
use sse::{SseDecoder, SseEvent};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Pinned; rewrite prompts are tuned against this model.
pub const MODEL: &str = "claude-sonnet-4-5";
/// A full structured resume plus change log comfortably fits in 8k tokens.
const MAX_TOKENS: u32 = 8192;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Stream ended before the model finished its answer")]
    Interrupted,

    #[error("Model output was cut off at the {0} token limit")]
    Truncated(u32),
}

/// A single prompt for a JSON-producing generation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
}

/// Streaming JSON generation.
///
/// Implementations push a fresh snapshot on `snapshots` every time the partial
/// output parses into a new JSON value; the last snapshot sent is the model's
/// answer. The return value is the terminal status of the generation: an `Err`
/// means the answer must not be used, whatever was streamed before it.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn stream_json(
        &self,
        request: GenerationRequest,
        snapshots: mpsc::Sender<Value>,
    ) -> Result<(), LlmError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Stream event payloads, keyed on their `type` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamPayload {
    ContentBlockDelta { delta: BlockDelta },
    MessageDelta { delta: MessageDeltaBody },
    MessageStop,
    Error { error: AnthropicErrorBody },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    stop_reason: Option<String>,
}

/// The single LLM client used by all services in cvpatch.
/// Wraps the Anthropic Messages API with retry logic and streaming JSON output.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            // No overall timeout: a streamed rewrite legitimately runs for minutes.
            client: Client::builder()
                .connect_timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    /// Opens a streaming Messages call.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff; once
    /// the stream is open, failures are terminal.
    async fn open_stream(&self, body: &AnthropicRequest<'_>) -> Result<Response, LlmError> {
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn stream_json(
        &self,
        request: GenerationRequest,
        snapshots: mpsc::Sender<Value>,
    ) -> Result<(), LlmError> {
        let body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system: &request.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: &request.prompt,
            }],
            stream: true,
        };

        let mut response = self.open_stream(&body).await?;
        let mut decoder = SseDecoder::default();
        let mut accumulator = SnapshotAccumulator::default();
        let mut finished = false;

        while !finished {
            let Some(chunk) = response.chunk().await? else {
                break;
            };
            for event in decoder.push(&chunk) {
                match handle_event(&event, &mut accumulator)? {
                    EventOutcome::Snapshot(snapshot) => {
                        if snapshots.send(snapshot).await.is_err() {
                            debug!("Snapshot receiver dropped; abandoning stream");
                            return Ok(());
                        }
                    }
                    EventOutcome::Finished => finished = true,
                    EventOutcome::Nothing => {}
                }
            }
        }

        if !finished {
            return Err(LlmError::Interrupted);
        }

        if let Some(complete) = accumulator.finish()? {
            // Receiver may already be gone; the answer is then simply unused.
            let _ = snapshots.send(complete).await;
        }

        debug!(
            "LLM stream finished: {} chars of output",
            accumulator.text.len()
        );
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stream event handling
// ────────────────────────────────────────────────────────────────────────────

enum EventOutcome {
    Snapshot(Value),
    Finished,
    Nothing,
}

/// Accumulates streamed text and remembers the last snapshot handed out so
/// identical snapshots are not re-sent.
#[derive(Default)]
struct SnapshotAccumulator {
    text: String,
    last_sent: Option<Value>,
    stop_reason: Option<String>,
}

impl SnapshotAccumulator {
    fn push(&mut self, delta: &str) -> Option<Value> {
        self.text.push_str(delta);
        let snapshot = parse_partial(&self.text)?;
        if self.last_sent.as_ref() == Some(&snapshot) {
            return None;
        }
        self.last_sent = Some(snapshot.clone());
        Some(snapshot)
    }

    /// The strictly parsed final answer, if it differs from the last snapshot.
    ///
    /// Snapshots are repaired partial JSON and may look complete when they are
    /// not, so a truncated or unparseable answer is an error here.
    fn finish(&mut self) -> Result<Option<Value>, LlmError> {
        if self.stop_reason.as_deref() == Some("max_tokens") {
            return Err(LlmError::Truncated(MAX_TOKENS));
        }
        let complete: Value = serde_json::from_str(strip_json_fences(&self.text))?;
        if self.last_sent.as_ref() == Some(&complete) {
            return Ok(None);
        }
        self.last_sent = Some(complete.clone());
        Ok(Some(complete))
    }
}

fn handle_event(
    event: &SseEvent,
    accumulator: &mut SnapshotAccumulator,
) -> Result<EventOutcome, LlmError> {
    let payload: StreamPayload = serde_json::from_str(&event.data)?;
    let outcome = match payload {
        StreamPayload::ContentBlockDelta {
            delta: BlockDelta::TextDelta { text },
        } => match accumulator.push(&text) {
            Some(snapshot) => EventOutcome::Snapshot(snapshot),
            None => EventOutcome::Nothing,
        },
        StreamPayload::MessageDelta { delta } => {
            if delta.stop_reason.as_deref() == Some("max_tokens") {
                warn!("LLM output hit max_tokens ({MAX_TOKENS}); answer is truncated");
            }
            accumulator.stop_reason = delta.stop_reason;
            EventOutcome::Nothing
        }
        StreamPayload::MessageStop => EventOutcome::Finished,
        StreamPayload::Error { error } => return Err(LlmError::Stream(error.message)),
        _ => EventOutcome::Nothing,
    };
    Ok(outcome)
}

/// Removes a Markdown code fence (with or without a language tag) around
/// the model's JSON.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner).trim_start();
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
