//! Resume rewriting: prompt building, streaming generation, invariant checks
//! and the single corrective retry.
//!
//! Two strategies share this machinery:
//! - `UnitPatch`: the model edits individual `<w:t>` runs of the uploaded file.
//! - `Structured`: the model rewrites the typed `ResumeData`, which is then
//!   rendered into the resume template.

use std::str::FromStr;

use anyhow::bail;
use serde::Serialize;

use crate::document::Edit;
use crate::resume::ResumeData;

pub mod prompts;
pub mod requestor;
pub mod retry;
pub mod structured;
pub mod unit_patch;
pub mod validator;

/// Which rewrite pipeline a deployment runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RewriteStrategy {
    #[default]
    UnitPatch,
    Structured,
}

impl FromStr for RewriteStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unit_patch" | "unit-patch" => Ok(RewriteStrategy::UnitPatch),
            "structured" => Ok(RewriteStrategy::Structured),
            other => bail!("unknown rewrite strategy '{other}' (expected unit_patch or structured)"),
        }
    }
}

/// The job a resume is being tailored for.
#[derive(Debug, Clone, Default)]
pub struct TargetJob {
    pub job_description: String,
    pub company_name: Option<String>,
    pub role_name: Option<String>,
}

/// Corrective context for the second attempt: the rejected candidate and why.
#[derive(Debug, Clone)]
pub struct RetryFeedback {
    /// The rejected candidate, serialized as JSON.
    pub previous: String,
    pub issues: Vec<String>,
}

/// An accepted rewrite, before it is turned back into a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RewriteOutcome {
    Patched { edits: Vec<Edit>, changes: Vec<String> },
    Structured { data: ResumeData, changes: Vec<String> },
}

impl RewriteOutcome {
    pub fn changes(&self) -> &[String] {
        match self {
            RewriteOutcome::Patched { changes, .. } | RewriteOutcome::Structured { changes, .. } => {
                changes
            }
        }
    }
}
