use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::resume::ResumeData;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PatchRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub title: String,
    pub job_description: String,
    pub company_name: String,
    pub role_name: String,
    pub streaming_text: Option<String>,
    pub patched_file_key: Option<String>,
    pub data: Option<Value>,
    pub changes: Option<Vec<String>>,
    pub status: String,
    pub error_message: Option<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchStatus {
    Generating,
    Ready,
    Error,
}

impl PatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchStatus::Generating => "generating",
            PatchStatus::Ready => "ready",
            PatchStatus::Error => "error",
        }
    }
}

/// Terminal update written once per rewrite job.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchCompletion {
    pub status: PatchStatus,
    pub patched_file_key: Option<String>,
    pub data: Option<ResumeData>,
    pub changes: Option<Vec<String>>,
    pub error_message: Option<String>,
}

impl PatchCompletion {
    pub fn ready(patched_file_key: String, changes: Vec<String>, data: Option<ResumeData>) -> Self {
        Self {
            status: PatchStatus::Ready,
            patched_file_key: Some(patched_file_key),
            data,
            changes: Some(changes),
            error_message: None,
        }
    }

    /// Every content field is cleared so a failed patch never shows stale output.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: PatchStatus::Error,
            patched_file_key: None,
            data: None,
            changes: None,
            error_message: Some(message.into()),
        }
    }
}
