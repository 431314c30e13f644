//! Deduplication trigger endpoint.

use axum::{Json, extract::State};
use relaypix_common::AppResult;
use relaypix_core::DedupOutcome;
use serde::{Deserialize, Serialize};

use crate::{response::ApiResponse, state::AppState};

/// Dedup request; omitting `ids` scans the whole catalog.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupRequest {
    pub ids: Option<Vec<String>>,
}

/// Dedup result.
///
/// `deleted == 0` with the "no duplicates" message is a success, reported
/// distinctly from an execution error (which surfaces as `status: error`).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupResponse {
    pub deleted: u64,
    pub groups: Vec<Vec<String>>,
    pub message: String,
}

/// Run the deduplication job.
pub async fn run_dedup(
    State(state): State<AppState>,
    Json(req): Json<DedupRequest>,
) -> AppResult<ApiResponse<DedupResponse>> {
    let outcome = state.dedup_service.run(req.ids).await?;

    let response = match outcome {
        DedupOutcome::NoDuplicates => DedupResponse {
            deleted: 0,
            groups: Vec::new(),
            message: "no duplicates found".to_string(),
        },
        DedupOutcome::Deleted { count, groups } => DedupResponse {
            deleted: count,
            message: format!("deleted {count} duplicates"),
            groups,
        },
    };

    Ok(ApiResponse::ok(response))
}
