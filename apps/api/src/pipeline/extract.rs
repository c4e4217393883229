//! Resume text extraction: pulls `word/document.xml` out of an uploaded
//! `.docx` so patch jobs can work on its text units.

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::document::{read_part, DOCUMENT_PART};
use crate::errors::PipelineError;
use crate::models::{ResumeExtraction, ResumeRow};
use crate::pipeline::PipelineContext;

/// Runs one extraction job to a terminal state.
pub async fn run_extract_job(ctx: &PipelineContext, resume_id: Uuid) {
    let resume = match ctx.records.get_resume(resume_id).await {
        Ok(Some(resume)) => resume,
        Ok(None) => {
            error!("Resume {resume_id} not found; nothing to extract");
            return;
        }
        Err(e) => {
            error!("Failed to load resume {resume_id}: {e:#}");
            return;
        }
    };

    let extraction = match extract_document_xml(ctx, &resume).await {
        Ok(xml) => {
            info!("Extracted {} bytes of document XML from resume {resume_id}", xml.len());
            ResumeExtraction::ready(xml)
        }
        Err(err) => {
            warn!("Extraction of resume {resume_id} failed: {err}");
            ResumeExtraction::failed(err.to_string())
        }
    };

    if let Err(e) = ctx.records.finish_resume_extraction(resume_id, extraction).await {
        error!("Failed to record extraction of resume {resume_id}: {e:#}");
    }
}

async fn extract_document_xml(
    ctx: &PipelineContext,
    resume: &ResumeRow,
) -> Result<String, PipelineError> {
    let bytes = ctx
        .blobs
        .get(&resume.file_key)
        .await?
        .ok_or(PipelineError::InputMissing("File not found in storage"))?;
    Ok(read_part(&bytes, DOCUMENT_PART)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::container::test_support::build_container;
    use crate::pipeline::test_support::harness;
    use crate::rewrite::RewriteStrategy;
    use crate::store::memory::resume_row;

    const XML: &str = "<w:document><w:body><w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p></w:body></w:document>";

    #[tokio::test]
    async fn test_extracts_document_xml() {
        let h = harness(RewriteStrategy::UnitPatch, vec![], None);
        let mut resume = resume_row("");
        resume.status = "processing".to_string();
        h.blobs.insert(&resume.file_key, build_container(&[(DOCUMENT_PART, XML)]));
        let resume_id = resume.id;
        h.records.insert_resume(resume);

        run_extract_job(&h.ctx, resume_id).await;

        let resume = h.records.resume(resume_id);
        assert_eq!(resume.status, "ready");
        assert_eq!(resume.extracted_xml, XML);
        assert!(resume.error_message.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_terminal() {
        let h = harness(RewriteStrategy::UnitPatch, vec![], None);
        let resume = resume_row("");
        let resume_id = resume.id;
        h.records.insert_resume(resume);

        run_extract_job(&h.ctx, resume_id).await;

        let resume = h.records.resume(resume_id);
        assert_eq!(resume.status, "error");
        assert_eq!(resume.error_message.as_deref(), Some("File not found in storage"));
        assert_eq!(resume.extracted_xml, "");
    }

    #[tokio::test]
    async fn test_container_without_document_part_is_terminal() {
        let h = harness(RewriteStrategy::UnitPatch, vec![], None);
        let resume = resume_row("");
        h.blobs.insert(&resume.file_key, build_container(&[("word/styles.xml", "<w:styles/>")]));
        let resume_id = resume.id;
        h.records.insert_resume(resume);

        run_extract_job(&h.ctx, resume_id).await;

        let resume = h.records.resume(resume_id);
        assert_eq!(resume.status, "error");
        assert_eq!(
            resume.error_message.as_deref(),
            Some("Could not find word/document.xml in docx file")
        );
    }
}
