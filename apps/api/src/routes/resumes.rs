use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::jobs::Job;
use crate::resume::validate_resume_value;
use crate::state::AppState;

/// POST /api/v1/resumes/:id/extract
/// Queues extraction of `word/document.xml` from the uploaded file.
pub async fn handle_extract(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if state.records.get_resume(resume_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Resume {resume_id} not found")));
    }

    state.jobs.enqueue(Job::ExtractResume { resume_id }).await?;
    info!("Queued text extraction for resume {resume_id}");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "resume_id": resume_id, "status": "processing" })),
    ))
}

/// POST /api/v1/resume-data/validate
/// Checks hand-edited resume data against the resume shape. Invalid data is a
/// 422 listing every problem with its JSON path.
pub async fn handle_validate_data(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    match validate_resume_value(&body) {
        Ok(data) => (StatusCode::OK, Json(json!({ "valid": true, "data": data }))),
        Err(errors) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "valid": false, "errors": errors })),
        ),
    }
}
