use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::{PatchCompletion, PatchRow, ResumeExtraction, ResumeRow};
use crate::store::RecordStore;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Records stored in Postgres. Every update is a last-write-wins
/// `UPDATE … WHERE id = $1`.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn get_patch(&self, id: Uuid) -> Result<Option<PatchRow>> {
        sqlx::query_as::<_, PatchRow>("SELECT * FROM patches WHERE id = $1 AND NOT deleted")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to load patch {id}"))
    }

    async fn get_resume(&self, id: Uuid) -> Result<Option<ResumeRow>> {
        sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1 AND NOT deleted")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to load resume {id}"))
    }

    async fn restart_patch(&self, patch_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE patches
            SET status = 'generating',
                streaming_text = NULL,
                patched_file_key = NULL,
                data = NULL,
                changes = NULL,
                error_message = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(patch_id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to restart patch {patch_id}"))?;
        Ok(())
    }

    async fn update_streaming_text(&self, patch_id: Uuid, text: &str) -> Result<()> {
        sqlx::query("UPDATE patches SET streaming_text = $2 WHERE id = $1")
            .bind(patch_id)
            .bind(text)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to update progress of patch {patch_id}"))?;
        Ok(())
    }

    async fn finish_patch(&self, patch_id: Uuid, completion: PatchCompletion) -> Result<()> {
        let data = completion
            .data
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .context("Failed to serialize patched resume data")?;

        sqlx::query(
            r#"
            UPDATE patches
            SET streaming_text = NULL,
                patched_file_key = $2,
                data = $3,
                changes = $4,
                status = $5,
                error_message = $6,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(patch_id)
        .bind(&completion.patched_file_key)
        .bind(data)
        .bind(&completion.changes)
        .bind(completion.status.as_str())
        .bind(&completion.error_message)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to finish patch {patch_id}"))?;
        Ok(())
    }

    async fn finish_resume_extraction(
        &self,
        resume_id: Uuid,
        extraction: ResumeExtraction,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE resumes
            SET extracted_xml = $2,
                status = $3,
                error_message = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(resume_id)
        .bind(&extraction.extracted_xml)
        .bind(extraction.status.as_str())
        .bind(&extraction.error_message)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to finish extraction of resume {resume_id}"))?;
        Ok(())
    }
}
