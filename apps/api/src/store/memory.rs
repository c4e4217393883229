//! In-memory stores for pipeline and route tests.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use crate::models::patch::PatchStatus;
use crate::models::resume::ResumeStatus;
use crate::models::{PatchCompletion, PatchRow, ResumeExtraction, ResumeRow};
use crate::store::{BlobStore, RecordStore};

#[derive(Default)]
pub struct MemoryRecordStore {
    pub patches: Mutex<HashMap<Uuid, PatchRow>>,
    pub resumes: Mutex<HashMap<Uuid, ResumeRow>>,
    /// Every progress text written, in order.
    pub progress: Mutex<Vec<String>>,
}

impl MemoryRecordStore {
    pub fn insert_patch(&self, patch: PatchRow) {
        self.patches.lock().unwrap().insert(patch.id, patch);
    }

    pub fn insert_resume(&self, resume: ResumeRow) {
        self.resumes.lock().unwrap().insert(resume.id, resume);
    }

    pub fn patch(&self, id: Uuid) -> PatchRow {
        self.patches.lock().unwrap()[&id].clone()
    }

    pub fn resume(&self, id: Uuid) -> ResumeRow {
        self.resumes.lock().unwrap()[&id].clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_patch(&self, id: Uuid) -> Result<Option<PatchRow>> {
        Ok(self.patches.lock().unwrap().get(&id).filter(|p| !p.deleted).cloned())
    }

    async fn get_resume(&self, id: Uuid) -> Result<Option<ResumeRow>> {
        Ok(self.resumes.lock().unwrap().get(&id).filter(|r| !r.deleted).cloned())
    }

    async fn restart_patch(&self, patch_id: Uuid) -> Result<()> {
        if let Some(patch) = self.patches.lock().unwrap().get_mut(&patch_id) {
            patch.status = PatchStatus::Generating.as_str().to_string();
            patch.streaming_text = None;
            patch.patched_file_key = None;
            patch.data = None;
            patch.changes = None;
            patch.error_message = None;
        }
        Ok(())
    }

    async fn update_streaming_text(&self, patch_id: Uuid, text: &str) -> Result<()> {
        self.progress.lock().unwrap().push(text.to_string());
        if let Some(patch) = self.patches.lock().unwrap().get_mut(&patch_id) {
            patch.streaming_text = Some(text.to_string());
        }
        Ok(())
    }

    async fn finish_patch(&self, patch_id: Uuid, completion: PatchCompletion) -> Result<()> {
        if let Some(patch) = self.patches.lock().unwrap().get_mut(&patch_id) {
            patch.streaming_text = None;
            patch.patched_file_key = completion.patched_file_key;
            patch.data = completion.data.map(|d| serde_json::to_value(d)).transpose()?;
            patch.changes = completion.changes;
            patch.status = completion.status.as_str().to_string();
            patch.error_message = completion.error_message;
            patch.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn finish_resume_extraction(
        &self,
        resume_id: Uuid,
        extraction: ResumeExtraction,
    ) -> Result<()> {
        if let Some(resume) = self.resumes.lock().unwrap().get_mut(&resume_id) {
            resume.extracted_xml = extraction.extracted_xml;
            resume.status = extraction.status.as_str().to_string();
            resume.error_message = extraction.error_message;
            resume.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    pub blobs: Mutex<HashMap<String, (Bytes, String)>>,
}

impl MemoryBlobStore {
    pub fn insert(&self, key: &str, bytes: impl Into<Bytes>) {
        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes.into(), "application/octet-stream".to_string()));
    }

    pub fn content(&self, key: &str) -> Option<(Bytes, String)> {
        self.blobs.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.blobs.lock().unwrap().get(key).map(|(bytes, _)| bytes.clone()))
    }

    async fn put(&self, bytes: Bytes, content_type: &str) -> Result<String> {
        let key = format!("files/{}", Uuid::new_v4());
        self.blobs
            .lock()
            .unwrap()
            .insert(key.clone(), (bytes, content_type.to_string()));
        Ok(key)
    }
}

pub fn resume_row(extracted_xml: &str) -> ResumeRow {
    ResumeRow {
        id: Uuid::new_v4(),
        title: "Jane Doe resume".to_string(),
        file_key: "uploads/jane.docx".to_string(),
        extracted_xml: extracted_xml.to_string(),
        data: None,
        template_id: None,
        status: ResumeStatus::Ready.as_str().to_string(),
        error_message: None,
        deleted: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn patch_row(resume_id: Uuid) -> PatchRow {
    PatchRow {
        id: Uuid::new_v4(),
        resume_id,
        title: "Ferris Inc".to_string(),
        job_description: "Rust backend engineer building billing systems".to_string(),
        company_name: "Ferris Inc".to_string(),
        role_name: "Backend Engineer".to_string(),
        streaming_text: None,
        patched_file_key: None,
        data: None,
        changes: None,
        status: PatchStatus::Generating.as_str().to_string(),
        error_message: None,
        deleted: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
