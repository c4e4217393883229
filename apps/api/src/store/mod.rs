//! Narrow views of the record store and blob store the pipeline depends on.
//!
//! The CRUD surface (creating, listing and deleting records, issuing upload
//! URLs) lives elsewhere; jobs only read their inputs and write results.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::models::{PatchCompletion, PatchRow, ResumeExtraction, ResumeRow};

#[cfg(test)]
pub mod memory;
pub mod postgres;
pub mod s3;

pub use postgres::PgRecordStore;
pub use s3::S3BlobStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Soft-deleted patches are reported as `None`.
    async fn get_patch(&self, id: Uuid) -> Result<Option<PatchRow>>;

    /// Soft-deleted resumes are reported as `None`.
    async fn get_resume(&self, id: Uuid) -> Result<Option<ResumeRow>>;

    /// Puts a patch back into `generating` with its previous output cleared.
    async fn restart_patch(&self, patch_id: Uuid) -> Result<()>;

    async fn update_streaming_text(&self, patch_id: Uuid, text: &str) -> Result<()>;

    /// Writes the terminal state of a patch and clears its progress text.
    async fn finish_patch(&self, patch_id: Uuid, completion: PatchCompletion) -> Result<()>;

    async fn finish_resume_extraction(
        &self,
        resume_id: Uuid,
        extraction: ResumeExtraction,
    ) -> Result<()>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Stores `bytes` under a fresh key and returns that key.
    async fn put(&self, bytes: Bytes, content_type: &str) -> Result<String>;
}
