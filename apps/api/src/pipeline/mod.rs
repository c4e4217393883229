//! Rewrite jobs: one invocation per patch, run by the job worker.
//!
//! Flow (unit-patch):  resume → extract text units → generate (+1 retry) →
//!                     load original file → patch units → store → finish
//! Flow (structured):  resume → typed data → generate (+1 retry) →
//!                     render template → store → finish
//!
//! `run_patch_job` is the single catch boundary: whatever goes wrong, the patch
//! ends as `error` with every content field cleared, never stuck in `generating`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::document::{extract_text_units, TemplateCache, DOCX_CONTENT_TYPE};
use crate::errors::PipelineError;
use crate::llm_client::TextGenerator;
use crate::models::{PatchCompletion, PatchRow, ResumeRow};
use crate::resume::validate_resume_value;
use crate::rewrite::requestor::{ProgressSink, RewriteRequestor};
use crate::rewrite::retry::run_with_retry;
use crate::rewrite::{structured, unit_patch, RewriteOutcome, RewriteStrategy, TargetJob};
use crate::store::{BlobStore, RecordStore};

pub mod extract;

pub use extract::run_extract_job;

/// Per-deployment knobs for the rewrite pipeline.
#[derive(Debug, Clone)]
pub struct RewriteSettings {
    pub strategy: RewriteStrategy,
    pub bullet_tolerance: f64,
    pub progress_interval: Duration,
}

/// Everything a job needs. Cheap to clone; shared by all concurrent jobs.
#[derive(Clone)]
pub struct PipelineContext {
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub generator: Arc<dyn TextGenerator>,
    pub templates: Arc<TemplateCache>,
    pub settings: RewriteSettings,
}

/// Writes progress lines to the patch record.
struct PatchProgress<'a> {
    records: &'a dyn RecordStore,
    patch_id: Uuid,
}

#[async_trait]
impl ProgressSink for PatchProgress<'_> {
    async fn report(&self, text: String) -> anyhow::Result<()> {
        self.records.update_streaming_text(self.patch_id, &text).await
    }
}

impl From<&PatchRow> for TargetJob {
    fn from(patch: &PatchRow) -> Self {
        let non_empty = |s: &str| Some(s.to_string()).filter(|s| !s.trim().is_empty());
        TargetJob {
            job_description: patch.job_description.clone(),
            company_name: non_empty(&patch.company_name),
            role_name: non_empty(&patch.role_name),
        }
    }
}

/// Runs one patch job to a terminal state.
pub async fn run_patch_job(ctx: &PipelineContext, patch_id: Uuid) {
    info!(
        "Starting patch {patch_id} (strategy: {:?})",
        ctx.settings.strategy
    );

    let patch = match ctx.records.get_patch(patch_id).await {
        Ok(Some(patch)) => patch,
        Ok(None) => {
            error!("Patch {patch_id} not found; nothing to update");
            return;
        }
        Err(e) => {
            error!("Failed to load patch {patch_id}: {e:#}");
            return;
        }
    };

    let completion = match generate_patch(ctx, &patch).await {
        Ok(completion) => {
            info!(
                "Patch {patch_id} ready with {} change(s)",
                completion.changes.as_ref().map_or(0, Vec::len)
            );
            completion
        }
        Err(err) => {
            warn!("Patch {patch_id} failed: {err}");
            PatchCompletion::failed(err.to_string())
        }
    };

    if let Err(e) = ctx.records.finish_patch(patch_id, completion).await {
        error!("Failed to record outcome of patch {patch_id}: {e:#}");
    }
}

async fn generate_patch(
    ctx: &PipelineContext,
    patch: &PatchRow,
) -> Result<PatchCompletion, PipelineError> {
    let resume = ctx
        .records
        .get_resume(patch.resume_id)
        .await?
        .ok_or(PipelineError::InputMissing("Resume not found"))?;

    let job = TargetJob::from(patch);
    let progress = PatchProgress {
        records: ctx.records.as_ref(),
        patch_id: patch.id,
    };
    let requestor = RewriteRequestor::new(
        Arc::clone(&ctx.generator),
        &progress,
        ctx.settings.progress_interval,
    );

    let (container, outcome) = match ctx.settings.strategy {
        RewriteStrategy::UnitPatch => patch_units(ctx, &requestor, &resume, &job).await?,
        RewriteStrategy::Structured => rewrite_structured(ctx, &requestor, &resume, &job).await?,
    };

    let key = ctx.blobs.put(container, DOCX_CONTENT_TYPE).await?;
    info!("Stored patched resume for patch {} as {key}", patch.id);

    Ok(match outcome {
        RewriteOutcome::Patched { changes, .. } => PatchCompletion::ready(key, changes, None),
        RewriteOutcome::Structured { data, changes } => {
            PatchCompletion::ready(key, changes, Some(data))
        }
    })
}

async fn patch_units(
    ctx: &PipelineContext,
    requestor: &RewriteRequestor<'_>,
    resume: &ResumeRow,
    job: &TargetJob,
) -> Result<(Bytes, RewriteOutcome), PipelineError> {
    if resume.extracted_xml.is_empty() {
        return Err(PipelineError::InputMissing("Resume XML not extracted"));
    }

    let doc = extract_text_units(&resume.extracted_xml);
    if doc.units.is_empty() {
        return Err(PipelineError::NoContent(
            "No text nodes found in resume XML".to_string(),
        ));
    }
    info!("Extracted {} text nodes from resume {}", doc.units.len(), resume.id);

    let doc_ref = &doc;
    let output = run_with_retry(
        move |feedback| async move {
            unit_patch::generate(requestor, doc_ref, job, feedback.as_ref()).await
        },
        |candidate: &unit_patch::PatchOutput| {
            unit_patch::validate_edits(&candidate.edits, doc_ref.units.len())
        },
    )
    .await?;

    let original = ctx
        .blobs
        .get(&resume.file_key)
        .await?
        .ok_or(PipelineError::InputMissing("Original resume file not found"))?;

    let container = unit_patch::reconstruct(&original, &doc, &output.edits)?;
    info!(
        "Patched {} of {} text nodes ({} bytes)",
        output.edits.len(),
        doc.units.len(),
        container.len()
    );

    Ok((
        container,
        RewriteOutcome::Patched {
            edits: output.edits,
            changes: output.changes,
        },
    ))
}

async fn rewrite_structured(
    ctx: &PipelineContext,
    requestor: &RewriteRequestor<'_>,
    resume: &ResumeRow,
    job: &TargetJob,
) -> Result<(Bytes, RewriteOutcome), PipelineError> {
    let value = resume
        .data
        .as_ref()
        .ok_or(PipelineError::InputMissing("Resume data not available"))?;
    let original = validate_resume_value(value).map_err(|errors| {
        let errors: Vec<String> = errors.iter().map(ToString::to_string).collect();
        PipelineError::NoContent(format!("Resume data is invalid: {}", errors.join("; ")))
    })?;

    let tolerance = ctx.settings.bullet_tolerance;
    let original_ref = &original;
    let output = run_with_retry(
        move |feedback| async move {
            structured::generate(requestor, original_ref, job, tolerance, feedback.as_ref()).await
        },
        |candidate: &structured::StructuredOutput| {
            structured::validate(candidate, original_ref, tolerance)
        },
    )
    .await?;

    let template = ctx.templates.get().await?;
    let container = structured::reconstruct(&template, &output.data)?;
    info!("Rendered structured resume ({} bytes)", container.len());

    Ok((
        container,
        RewriteOutcome::Structured {
            data: output.data,
            changes: output.changes,
        },
    ))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use serde_json::Value;
    use tokio::sync::mpsc;

    use crate::llm_client::{GenerationRequest, LlmError};
    use crate::rewrite::validator::DEFAULT_BULLET_TOLERANCE;
    use crate::store::memory::{MemoryBlobStore, MemoryRecordStore};

    /// Answers each call with the next queued value; `None` simulates a
    /// stream that breaks before finishing.
    #[derive(Default)]
    pub struct SequenceGenerator {
        pub answers: Mutex<VecDeque<Option<Value>>>,
        pub requests: Mutex<Vec<GenerationRequest>>,
    }

    impl SequenceGenerator {
        pub fn new(answers: Vec<Option<Value>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn prompts(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.prompt.clone())
                .collect()
        }
    }

    #[async_trait]
    impl TextGenerator for SequenceGenerator {
        async fn stream_json(
            &self,
            request: GenerationRequest,
            snapshots: mpsc::Sender<Value>,
        ) -> Result<(), LlmError> {
            self.requests.lock().unwrap().push(request);
            let answer = self.answers.lock().unwrap().pop_front().flatten();
            match answer {
                Some(value) => {
                    let _ = snapshots.send(value).await;
                    Ok(())
                }
                None => Err(LlmError::Interrupted),
            }
        }
    }

    pub struct Harness {
        pub records: Arc<MemoryRecordStore>,
        pub blobs: Arc<MemoryBlobStore>,
        pub generator: Arc<SequenceGenerator>,
        pub ctx: PipelineContext,
    }

    pub fn harness(
        strategy: RewriteStrategy,
        answers: Vec<Option<Value>>,
        template: Option<Bytes>,
    ) -> Harness {
        let records = Arc::new(MemoryRecordStore::default());
        let blobs = Arc::new(MemoryBlobStore::default());
        let generator = Arc::new(SequenceGenerator::new(answers));
        let templates = match template {
            Some(bytes) => TemplateCache::preloaded(bytes),
            None => TemplateCache::new("/nonexistent/resume-template.docx"),
        };
        let ctx = PipelineContext {
            records: records.clone(),
            blobs: blobs.clone(),
            generator: generator.clone(),
            templates: Arc::new(templates),
            settings: RewriteSettings {
                strategy,
                bullet_tolerance: DEFAULT_BULLET_TOLERANCE,
                progress_interval: Duration::from_millis(500),
            },
        };
        Harness {
            records,
            blobs,
            generator,
            ctx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use serde_json::json;

    use crate::document::container::test_support::build_container;
    use crate::document::{read_part, DOCUMENT_PART};
    use crate::resume::schema::fixtures::sample_resume;
    use crate::resume::ResumeData;
    use crate::rewrite::requestor::test_support::ScriptedGenerator;
    use crate::store::memory::{patch_row, resume_row};

    const RESUME_XML: &str = concat!(
        r#"<w:document><w:body>"#,
        r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Jane Doe</w:t></w:r></w:p>"#,
        r#"<w:p><w:r><w:t xml:space="preserve">Built a billing service in Go</w:t></w:r></w:p>"#,
        r#"<w:p><w:r><w:t>Skills: Go &amp; SQL</w:t></w:r></w:p>"#,
        r#"</w:body></w:document>"#
    );

    /// Seeds a resume (with its uploaded file) and a patch; returns the patch id.
    fn seed(h: &Harness, extracted_xml: &str) -> Uuid {
        let resume = resume_row(extracted_xml);
        h.blobs.insert(
            &resume.file_key,
            build_container(&[
                ("[Content_Types].xml", "<Types/>"),
                (DOCUMENT_PART, RESUME_XML),
                ("word/styles.xml", "<w:styles/>"),
            ]),
        );
        let patch = patch_row(resume.id);
        let patch_id = patch.id;
        h.records.insert_resume(resume);
        h.records.insert_patch(patch);
        patch_id
    }

    fn assert_failed(patch: &PatchRow, message: &str) {
        assert_eq!(patch.status, "error");
        assert_eq!(patch.error_message.as_deref(), Some(message));
        assert!(patch.patched_file_key.is_none());
        assert!(patch.changes.is_none());
        assert!(patch.data.is_none());
        assert!(patch.streaming_text.is_none());
    }

    #[tokio::test]
    async fn test_unit_patch_happy_path() {
        let h = harness(
            RewriteStrategy::UnitPatch,
            vec![Some(json!({
                "changes": ["Added Rust to skills"],
                "edits": [{"id": 2, "text": "Skills: Rust, Go & SQL"}]
            }))],
            None,
        );
        let patch_id = seed(&h, RESUME_XML);

        run_patch_job(&h.ctx, patch_id).await;

        let patch = h.records.patch(patch_id);
        assert_eq!(patch.status, "ready");
        assert_eq!(patch.changes, Some(vec!["Added Rust to skills".to_string()]));
        assert!(patch.data.is_none());

        let key = patch.patched_file_key.unwrap();
        let (bytes, content_type) = h.blobs.content(&key).unwrap();
        assert_eq!(content_type, DOCX_CONTENT_TYPE);
        let xml = read_part(&bytes, DOCUMENT_PART).unwrap();
        assert_eq!(xml, RESUME_XML.replace("Go &amp; SQL", "Rust, Go &amp; SQL"));
        assert_eq!(read_part(&bytes, "word/styles.xml").unwrap(), "<w:styles/>");

        let prompts = h.generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Company: Ferris Inc"));
    }

    #[tokio::test]
    async fn test_missing_resume_is_terminal() {
        let h = harness(RewriteStrategy::UnitPatch, vec![], None);
        let patch = patch_row(Uuid::new_v4());
        let patch_id = patch.id;
        h.records.insert_patch(patch);

        run_patch_job(&h.ctx, patch_id).await;

        assert_failed(&h.records.patch(patch_id), "Resume not found");
        assert!(h.generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_soft_deleted_resume_counts_as_missing() {
        let h = harness(RewriteStrategy::UnitPatch, vec![], None);
        let patch_id = seed(&h, RESUME_XML);
        let resume_id = h.records.patch(patch_id).resume_id;
        h.records.resumes.lock().unwrap().get_mut(&resume_id).unwrap().deleted = true;

        run_patch_job(&h.ctx, patch_id).await;

        assert_failed(&h.records.patch(patch_id), "Resume not found");
    }

    #[tokio::test]
    async fn test_missing_patch_is_logged_and_ignored() {
        let h = harness(RewriteStrategy::UnitPatch, vec![], None);
        run_patch_job(&h.ctx, Uuid::new_v4()).await;
        assert!(h.records.patches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unextracted_resume_is_terminal() {
        let h = harness(RewriteStrategy::UnitPatch, vec![], None);
        let patch_id = seed(&h, "");

        run_patch_job(&h.ctx, patch_id).await;

        assert_failed(&h.records.patch(patch_id), "Resume XML not extracted");
    }

    #[tokio::test]
    async fn test_document_without_text_nodes_is_terminal() {
        let h = harness(RewriteStrategy::UnitPatch, vec![], None);
        let patch_id = seed(&h, "<w:document><w:body><w:p/><w:tbl/></w:body></w:document>");

        run_patch_job(&h.ctx, patch_id).await;

        assert_failed(&h.records.patch(patch_id), "No text nodes found in resume XML");
        assert!(h.generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_retry_converges_and_merges_changes() {
        let h = harness(
            RewriteStrategy::UnitPatch,
            vec![
                Some(json!({
                    "changes": ["Added Rust to skills"],
                    "edits": [{"id": 7, "text": "Rust"}]
                })),
                Some(json!({
                    "changes": ["Added Rust to skills", "Mentioned payments"],
                    "edits": [{"id": 2, "text": "Skills: Rust & SQL"}]
                })),
            ],
            None,
        );
        let patch_id = seed(&h, RESUME_XML);

        run_patch_job(&h.ctx, patch_id).await;

        let patch = h.records.patch(patch_id);
        assert_eq!(patch.status, "ready");
        assert_eq!(
            patch.changes,
            Some(vec![
                "Added Rust to skills".to_string(),
                "Mentioned payments".to_string()
            ])
        );

        let prompts = h.generator.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(!prompts[0].contains("REJECTED"));
        assert!(prompts[1].contains("edits[0].id 7 is not a known text node id"));
    }

    #[tokio::test]
    async fn test_two_validation_failures_are_terminal() {
        let bad = |id: i64| {
            Some(json!({"changes": [], "edits": [{"id": id, "text": "x"}, {"id": -1, "text": "y"}]}))
        };
        let h = harness(RewriteStrategy::UnitPatch, vec![bad(5), bad(9)], None);
        let patch_id = seed(&h, RESUME_XML);

        run_patch_job(&h.ctx, patch_id).await;

        let patch = h.records.patch(patch_id);
        assert_eq!(patch.status, "error");
        let message = patch.error_message.unwrap();
        assert!(message.contains("edits[0].id 9"));
        assert!(message.contains("edits[1].id -1"));
        assert!(!message.contains("edits[0].id 5"));
        assert!(patch.patched_file_key.is_none());
        assert!(h.blobs.blobs.lock().unwrap().len() == 1);
    }

    #[tokio::test]
    async fn test_stream_failure_is_terminal() {
        let h = harness(RewriteStrategy::UnitPatch, vec![None], None);
        let patch_id = seed(&h, RESUME_XML);

        run_patch_job(&h.ctx, patch_id).await;

        assert_failed(
            &h.records.patch(patch_id),
            "Stream ended before the model finished its answer",
        );
    }

    #[tokio::test]
    async fn test_missing_original_file_is_terminal() {
        let h = harness(
            RewriteStrategy::UnitPatch,
            vec![Some(json!({"changes": [], "edits": []}))],
            None,
        );
        let patch_id = seed(&h, RESUME_XML);
        h.blobs.blobs.lock().unwrap().clear();

        run_patch_job(&h.ctx, patch_id).await;

        assert_failed(&h.records.patch(patch_id), "Original resume file not found");
    }

    fn structured_template() -> Bytes {
        let xml = concat!(
            "<w:document><w:body>",
            "<w:p><w:r><w:t>{header.name}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{#experience}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{#roles}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{#bullets}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{.}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{/bullets}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{/roles}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{/experience}</w:t></w:r></w:p>",
            "</w:body></w:document>"
        );
        Bytes::from(build_container(&[(DOCUMENT_PART, xml), ("word/styles.xml", "<w:styles/>")]))
    }

    fn seed_structured(h: &Harness) -> Uuid {
        let patch_id = seed(h, "");
        let resume_id = h.records.patch(patch_id).resume_id;
        h.records.resumes.lock().unwrap().get_mut(&resume_id).unwrap().data =
            Some(serde_json::to_value(sample_resume()).unwrap());
        patch_id
    }

    fn structured_answer(data: &ResumeData, changes: &[&str]) -> Option<serde_json::Value> {
        Some(json!({"data": data, "changes": changes}))
    }

    #[tokio::test]
    async fn test_structured_happy_path_renders_template() {
        let mut rewritten = sample_resume();
        rewritten.experience[0].roles[0].bullets[0] = "Built a billing service in Rust".to_string();
        let h = harness(
            RewriteStrategy::Structured,
            vec![structured_answer(&rewritten, &["Swapped Go for Rust"])],
            Some(structured_template()),
        );
        let patch_id = seed_structured(&h);

        run_patch_job(&h.ctx, patch_id).await;

        let patch = h.records.patch(patch_id);
        assert_eq!(patch.status, "ready");
        assert_eq!(patch.data, Some(serde_json::to_value(&rewritten).unwrap()));

        let (bytes, _) = h.blobs.content(&patch.patched_file_key.unwrap()).unwrap();
        let xml = read_part(&bytes, DOCUMENT_PART).unwrap();
        assert!(xml.contains("<w:t>Jane Doe</w:t>"));
        assert!(xml.contains("<w:t>Built a billing service in Rust</w:t>"));
        assert!(xml.contains("<w:t>Cut deploy time from 40 to 5 minutes</w:t>"));
        assert!(!xml.contains('{'));
    }

    #[tokio::test]
    async fn test_structured_double_failure_reports_second_issues() {
        let mut first = sample_resume();
        first.header.email = "someone@else.com".to_string();
        let mut second = sample_resume();
        second.experience[0].roles[0].bullets[0] = "x".repeat(200);

        let h = harness(
            RewriteStrategy::Structured,
            vec![structured_answer(&first, &[]), structured_answer(&second, &[])],
            Some(structured_template()),
        );
        let patch_id = seed_structured(&h);

        run_patch_job(&h.ctx, patch_id).await;

        let patch = h.records.patch(patch_id);
        assert_eq!(patch.status, "error");
        let message = patch.error_message.unwrap();
        assert!(message.contains("experience[0].roles[0].bullets[0] is 200 characters"));
        assert!(!message.contains("header.email"));
        assert!(patch.data.is_none());
    }

    #[tokio::test]
    async fn test_structured_without_data_is_terminal() {
        let h = harness(RewriteStrategy::Structured, vec![], Some(structured_template()));
        let patch_id = seed(&h, RESUME_XML);

        run_patch_job(&h.ctx, patch_id).await;

        assert_failed(&h.records.patch(patch_id), "Resume data not available");
    }

    #[tokio::test]
    async fn test_structured_missing_template_is_terminal() {
        let h = harness(
            RewriteStrategy::Structured,
            vec![structured_answer(&sample_resume(), &[])],
            None,
        );
        let patch_id = seed_structured(&h);

        run_patch_job(&h.ctx, patch_id).await;

        let patch = h.records.patch(patch_id);
        assert_eq!(patch.status, "error");
        assert!(patch
            .error_message
            .unwrap()
            .starts_with("Failed to read resume template"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_is_written_while_streaming() {
        let mut h = harness(RewriteStrategy::UnitPatch, vec![], None);
        let snapshot = json!({
            "changes": ["Added Rust to skills"],
            "edits": [{"id": 2, "text": "Skills: Rust, Go & SQL"}]
        });
        h.ctx.generator = Arc::new(ScriptedGenerator::new(vec![snapshot; 6]));
        let patch_id = seed(&h, RESUME_XML);

        run_patch_job(&h.ctx, patch_id).await;

        assert_eq!(
            *h.records.progress.lock().unwrap(),
            vec!["Changes identified:\n• Added Rust to skills\n\nEdits drafted: 1".to_string()]
        );
        let patch = h.records.patch(patch_id);
        assert_eq!(patch.status, "ready");
        assert!(patch.streaming_text.is_none());
    }

    #[test]
    fn test_target_job_drops_blank_context() {
        let mut patch = patch_row(Uuid::new_v4());
        patch.company_name = "".to_string();
        let job = TargetJob::from(&patch);
        assert_eq!(job.company_name, None);
        assert_eq!(job.role_name.as_deref(), Some("Backend Engineer"));
    }
}
