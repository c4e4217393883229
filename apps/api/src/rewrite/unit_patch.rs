//! Unit-patch strategy: the model edits individual text runs of the uploaded
//! document, identified by id. It never sees markup.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::document::{apply_edits, replace_part, ContainerError, Edit, EditSet, ExtractedDocument, DOCUMENT_PART};
use crate::errors::PipelineError;
use crate::llm_client::prompts::{
    fill_template, retry_feedback, FACT_PRESERVATION_INSTRUCTION, JSON_ONLY_SYSTEM,
};
use crate::llm_client::GenerationRequest;
use crate::rewrite::prompts::{job_context, UNIT_PATCH_PROMPT_TEMPLATE, UNIT_PATCH_SYSTEM_TEMPLATE};
use crate::rewrite::requestor::{unit_patch_progress, RewriteRequestor};
use crate::rewrite::retry::Candidate;
use crate::rewrite::{RetryFeedback, TargetJob};

/// What the model returns for this strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOutput {
    pub changes: Vec<String>,
    pub edits: Vec<Edit>,
}

impl Candidate for PatchOutput {
    fn changes(&self) -> &[String] {
        &self.changes
    }

    fn changes_mut(&mut self) -> &mut Vec<String> {
        &mut self.changes
    }
}

/// Builds the prompt: only `(id, text)` pairs, never raw markup.
pub fn build_request(
    doc: &ExtractedDocument,
    job: &TargetJob,
    feedback: Option<&RetryFeedback>,
) -> GenerationRequest {
    let units: Vec<_> = doc
        .units
        .iter()
        .map(|unit| json!({"id": unit.id, "text": unit.text}))
        .collect();
    let units_json = serde_json::Value::Array(units).to_string();

    let system = fill_template(
        UNIT_PATCH_SYSTEM_TEMPLATE,
        &[
            ("fact_preservation", FACT_PRESERVATION_INSTRUCTION),
            ("json_only", JSON_ONLY_SYSTEM),
        ],
    );

    let context = job_context(job.company_name.as_deref(), job.role_name.as_deref());
    let mut prompt = fill_template(
        UNIT_PATCH_PROMPT_TEMPLATE,
        &[
            ("units_json", units_json.as_str()),
            ("job_description", job.job_description.as_str()),
            ("job_context", context.as_str()),
        ],
    );
    if let Some(feedback) = feedback {
        prompt.push_str(&retry_feedback(&feedback.previous, &feedback.issues));
    }

    GenerationRequest { system, prompt }
}

/// Streams one unit-patch generation.
pub async fn generate(
    requestor: &RewriteRequestor<'_>,
    doc: &ExtractedDocument,
    job: &TargetJob,
    feedback: Option<&RetryFeedback>,
) -> Result<PatchOutput, PipelineError> {
    requestor
        .request(build_request(doc, job, feedback), unit_patch_progress)
        .await
}

/// One issue per edit whose id does not address an existing unit.
pub fn validate_edits(edits: &[Edit], unit_count: usize) -> Vec<String> {
    edits
        .iter()
        .enumerate()
        .filter(|(_, edit)| edit.id < 0 || edit.id as u64 >= unit_count as u64)
        .map(|(index, edit)| {
            format!(
                "edits[{index}].id {} is not a known text node id (valid ids are 0 to {})",
                edit.id,
                unit_count.saturating_sub(1)
            )
        })
        .collect()
}

/// Patches the addressed units and re-embeds the markup into the original file.
pub fn reconstruct(
    original: &[u8],
    doc: &ExtractedDocument,
    edits: &[Edit],
) -> Result<Bytes, ContainerError> {
    let edit_set = EditSet::from_edits(edits, doc.units.len());
    let xml = apply_edits(doc, &edit_set);
    replace_part(original, DOCUMENT_PART, xml.as_bytes())
}
