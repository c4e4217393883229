//! Structured strategy: the model rewrites the typed resume, which is then
//! rendered into the resume template.

use anyhow::Context;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::document::template::render;
use crate::document::{read_part, replace_part, DOCUMENT_PART};
use crate::errors::PipelineError;
use crate::llm_client::prompts::{
    fill_template, retry_feedback, FACT_PRESERVATION_INSTRUCTION, JSON_ONLY_SYSTEM,
};
use crate::llm_client::GenerationRequest;
use crate::resume::ResumeData;
use crate::rewrite::prompts::{job_context, STRUCTURED_PROMPT_TEMPLATE, STRUCTURED_SYSTEM_TEMPLATE};
use crate::rewrite::requestor::{structured_progress, RewriteRequestor};
use crate::rewrite::retry::Candidate;
use crate::rewrite::validator;
use crate::rewrite::{RetryFeedback, TargetJob};

/// What the model returns for this strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredOutput {
    pub data: ResumeData,
    pub changes: Vec<String>,
}

impl Candidate for StructuredOutput {
    fn changes(&self) -> &[String] {
        &self.changes
    }

    fn changes_mut(&mut self) -> &mut Vec<String> {
        &mut self.changes
    }
}

pub fn build_request(
    original: &ResumeData,
    job: &TargetJob,
    tolerance: f64,
    feedback: Option<&RetryFeedback>,
) -> Result<GenerationRequest, PipelineError> {
    let resume_json =
        serde_json::to_string_pretty(original).context("Failed to serialize resume data")?;
    let tolerance_percent = format!("{}", (tolerance * 100.0).round() as i64);

    let system = fill_template(
        STRUCTURED_SYSTEM_TEMPLATE,
        &[
            ("tolerance_percent", tolerance_percent.as_str()),
            ("fact_preservation", FACT_PRESERVATION_INSTRUCTION),
            ("json_only", JSON_ONLY_SYSTEM),
        ],
    );

    let context = job_context(job.company_name.as_deref(), job.role_name.as_deref());
    let mut prompt = fill_template(
        STRUCTURED_PROMPT_TEMPLATE,
        &[
            ("resume_json", resume_json.as_str()),
            ("job_description", job.job_description.as_str()),
            ("job_context", context.as_str()),
        ],
    );
    if let Some(feedback) = feedback {
        prompt.push_str(&retry_feedback(&feedback.previous, &feedback.issues));
    }

    Ok(GenerationRequest { system, prompt })
}

/// Streams one structured generation.
pub async fn generate(
    requestor: &RewriteRequestor<'_>,
    original: &ResumeData,
    job: &TargetJob,
    tolerance: f64,
    feedback: Option<&RetryFeedback>,
) -> Result<StructuredOutput, PipelineError> {
    let request = build_request(original, job, tolerance, feedback)?;
    requestor.request(request, structured_progress).await
}

pub fn validate(candidate: &StructuredOutput, original: &ResumeData, tolerance: f64) -> Vec<String> {
    validator::validate(&candidate.data, original, tolerance)
}

/// Renders `data` into the template's document part. Every other part of the
/// template container is carried over untouched.
pub fn reconstruct(template: &[u8], data: &ResumeData) -> Result<Bytes, PipelineError> {
    let template_xml = read_part(template, DOCUMENT_PART)?;
    let value = serde_json::to_value(data).context("Failed to serialize resume data")?;
    let rendered = render(&template_xml, &value)?;
    Ok(replace_part(template, DOCUMENT_PART, rendered.as_bytes())?)
}
