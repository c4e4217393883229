use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub title: String,
    /// Blob-store key of the uploaded `.docx`.
    pub file_key: String,
    /// `word/document.xml` of the upload; empty until extraction has run.
    pub extracted_xml: String,
    /// Structured resume (`ResumeData` shape), if one has been entered.
    pub data: Option<Value>,
    pub template_id: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeStatus {
    Processing,
    Ready,
    Error,
}

impl ResumeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResumeStatus::Processing => "processing",
            ResumeStatus::Ready => "ready",
            ResumeStatus::Error => "error",
        }
    }
}

/// Terminal result of the text extraction job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeExtraction {
    pub status: ResumeStatus,
    pub extracted_xml: String,
    pub error_message: Option<String>,
}

impl ResumeExtraction {
    pub fn ready(extracted_xml: String) -> Self {
        Self {
            status: ResumeStatus::Ready,
            extracted_xml,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ResumeStatus::Error,
            extracted_xml: String::new(),
            error_message: Some(message.into()),
        }
    }
}
