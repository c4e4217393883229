use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::jobs::Job;
use crate::state::AppState;

/// What a client polls while a patch is generating.
#[derive(Debug, Serialize)]
pub struct PatchStatusResponse {
    pub id: Uuid,
    pub status: String,
    pub streaming_text: Option<String>,
    pub changes: Option<Vec<String>>,
    pub patched_file_key: Option<String>,
    pub error_message: Option<String>,
}

/// POST /api/v1/patches/:id/generate
/// Resets the patch to `generating` and queues the rewrite job.
pub async fn handle_generate(
    State(state): State<AppState>,
    Path(patch_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if state.records.get_patch(patch_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Patch {patch_id} not found")));
    }

    state.records.restart_patch(patch_id).await?;
    state.jobs.enqueue(Job::GeneratePatch { patch_id }).await?;
    info!("Queued generation for patch {patch_id}");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "patch_id": patch_id, "status": "generating" })),
    ))
}

/// GET /api/v1/patches/:id/status
pub async fn handle_status(
    State(state): State<AppState>,
    Path(patch_id): Path<Uuid>,
) -> Result<Json<PatchStatusResponse>, AppError> {
    let patch = state
        .records
        .get_patch(patch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Patch {patch_id} not found")))?;

    Ok(Json(PatchStatusResponse {
        id: patch.id,
        status: patch.status,
        streaming_text: patch.streaming_text,
        changes: patch.changes,
        patched_file_key: patch.patched_file_key,
        error_message: patch.error_message,
    }))
}
