//! Runs one streaming generation and surfaces progress.
//!
//! The generator runs as its own task and pushes parsed JSON snapshots over a
//! channel. This side keeps the latest snapshot, forwards a progress summary at
//! most once per interval, and only after the channel closes looks at the
//! producer's terminal result. A failed stream is never treated as success,
//! whatever it streamed before failing.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::PipelineError;
use crate::llm_client::{GenerationRequest, TextGenerator};

pub const NO_OUTPUT_MESSAGE: &str = "LLM did not return output";
pub const ANALYZING_MESSAGE: &str = "Analyzing resume...";

/// Default minimum spacing between two progress updates.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

const SNAPSHOT_BUFFER: usize = 32;

/// Receives human-readable progress while a generation is streaming.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, text: String) -> anyhow::Result<()>;
}

/// Turns the latest partial snapshot into a progress line.
pub type ProgressSummary = fn(&Value) -> String;

pub struct RewriteRequestor<'a> {
    generator: Arc<dyn TextGenerator>,
    progress: &'a dyn ProgressSink,
    interval: Duration,
}

impl<'a> RewriteRequestor<'a> {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        progress: &'a dyn ProgressSink,
        interval: Duration,
    ) -> Self {
        Self {
            generator,
            progress,
            interval,
        }
    }

    /// Streams one generation to completion and decodes its final snapshot.
    pub async fn request<T: DeserializeOwned>(
        &self,
        request: GenerationRequest,
        summarize: ProgressSummary,
    ) -> Result<T, PipelineError> {
        let (tx, mut rx) = mpsc::channel::<Value>(SNAPSHOT_BUFFER);
        let generator = Arc::clone(&self.generator);
        let producer = tokio::spawn(async move { generator.stream_json(request, tx).await });

        let mut latest: Option<Value> = None;
        let mut last_report = Instant::now();
        let mut snapshots = 0usize;

        while let Some(snapshot) = rx.recv().await {
            snapshots += 1;
            if last_report.elapsed() >= self.interval {
                if let Err(e) = self.progress.report(summarize(&snapshot)).await {
                    warn!("Failed to publish rewrite progress: {e:#}");
                }
                last_report = Instant::now();
            }
            latest = Some(snapshot);
        }

        match producer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Generation failed after {snapshots} snapshot(s): {e}");
                return Err(PipelineError::Generation(e));
            }
            Err(e) => return Err(anyhow!("Generation task aborted: {e}").into()),
        }
        debug!("Generation finished after {snapshots} snapshot(s)");

        let Some(output) = latest else {
            return Err(PipelineError::NoOutput(NO_OUTPUT_MESSAGE.to_string()));
        };
        serde_json::from_value(output).map_err(|e| {
            warn!("Final generation output has the wrong shape: {e}");
            PipelineError::NoOutput(NO_OUTPUT_MESSAGE.to_string())
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Progress summaries
// ────────────────────────────────────────────────────────────────────────────

/// Progress for unit-patch output: `{changes: [...], edits: [...]}`.
pub fn unit_patch_progress(snapshot: &Value) -> String {
    let edits = snapshot
        .get("edits")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    let detail = (edits > 0).then(|| format!("Edits drafted: {edits}"));
    progress_text(snapshot, detail)
}

/// Progress for structured output: `{data: {...}, changes: [...]}`.
pub fn structured_progress(snapshot: &Value) -> String {
    const SECTIONS: [&str; 6] = ["header", "education", "experience", "projects", "skills", "extras"];

    let drafted: Vec<&str> = snapshot
        .get("data")
        .and_then(Value::as_object)
        .map(|data| SECTIONS.iter().copied().filter(|s| data.contains_key(*s)).collect())
        .unwrap_or_default();
    let detail = (!drafted.is_empty()).then(|| format!("Sections drafted: {}", drafted.join(", ")));
    progress_text(snapshot, detail)
}

fn progress_text(snapshot: &Value, detail: Option<String>) -> String {
    let changes: Vec<&str> = snapshot
        .get("changes")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut sections = Vec::new();
    if !changes.is_empty() {
        let bullets: Vec<String> = changes.iter().map(|c| format!("• {c}")).collect();
        sections.push(format!("Changes identified:\n{}", bullets.join("\n")));
    }
    sections.extend(detail);

    if sections.is_empty() {
        ANALYZING_MESSAGE.to_string()
    } else {
        sections.join("\n\n")
    }
}
