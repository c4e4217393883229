//! Retry Orchestrator.
//!
//! `Generate → Validate → Accept`, or on failure exactly one
//! `Retry → Validate → Accept | Reject`. There is no further looping.

use std::future::Future;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::PipelineError;
use crate::rewrite::RetryFeedback;

/// A generated answer that carries a change log.
pub trait Candidate: Serialize {
    fn changes(&self) -> &[String];
    fn changes_mut(&mut self) -> &mut Vec<String>;
}

/// Runs `generate` once, and once more with feedback if `validate` reports issues.
///
/// `generate` receives `None` on the first attempt and the rejected candidate
/// plus its issues on the retry. Generation errors on either attempt are
/// returned as-is. When the retry is accepted, its change log becomes the
/// ordered union of both attempts' logs (first attempt first).
pub async fn run_with_retry<T, G, Fut, V>(mut generate: G, validate: V) -> Result<T, PipelineError>
where
    T: Candidate,
    G: FnMut(Option<RetryFeedback>) -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
    V: Fn(&T) -> Vec<String>,
{
    let first = generate(None).await?;
    let issues = validate(&first);
    if issues.is_empty() {
        return Ok(first);
    }

    warn!(
        "Rewrite rejected with {} issue(s), retrying once: {}",
        issues.len(),
        issues.join("; ")
    );
    let previous =
        serde_json::to_string_pretty(&first).context("Failed to serialize rejected rewrite")?;
    let mut second = generate(Some(RetryFeedback { previous, issues })).await?;

    let issues = validate(&second);
    if !issues.is_empty() {
        return Err(PipelineError::ValidationFailed { issues });
    }

    let merged = merge_changes(first.changes(), second.changes());
    *second.changes_mut() = merged;
    info!("Rewrite accepted after retry");
    Ok(second)
}

/// Ordered set union: every distinct entry once, in first-seen order.
pub fn merge_changes(first: &[String], second: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(first.len() + second.len());
    for change in first.iter().chain(second) {
        if !merged.contains(change) {
            merged.push(change.clone());
        }
    }
    merged
}
