//! Folder lifecycle endpoints.

use axum::{Json, extract::State};
use relaypix_common::AppResult;
use serde::{Deserialize, Serialize};

use crate::{response::ApiResponse, state::AppState};

/// Folder listing.
pub async fn list_folders(
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<String>>> {
    let folders = state.folder_service.list().await?;
    Ok(ApiResponse::ok(folders))
}

/// Count of rows affected by a folder operation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedResponse {
    pub affected: u64,
}

/// Rename request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameFolderRequest {
    pub old_path: String,
    pub new_path: String,
}

/// Rename a folder subtree.
pub async fn rename_folder(
    State(state): State<AppState>,
    Json(req): Json<RenameFolderRequest>,
) -> AppResult<ApiResponse<AffectedResponse>> {
    let affected = state
        .folder_service
        .rename(&req.old_path, &req.new_path)
        .await?;
    Ok(ApiResponse::ok(AffectedResponse { affected }))
}

/// Delete request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFolderRequest {
    pub path: String,
}

/// Delete a folder subtree and every record in it.
pub async fn delete_folder(
    State(state): State<AppState>,
    Json(req): Json<DeleteFolderRequest>,
) -> AppResult<ApiResponse<AffectedResponse>> {
    let affected = state.folder_service.delete(&req.path).await?;
    Ok(ApiResponse::ok(AffectedResponse { affected }))
}

/// Move request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveImagesRequest {
    pub ids: Vec<String>,
    pub target_folder: String,
}

/// Move rows into a folder.
pub async fn move_images(
    State(state): State<AppState>,
    Json(req): Json<MoveImagesRequest>,
) -> AppResult<ApiResponse<AffectedResponse>> {
    let affected = state
        .folder_service
        .move_images(&req.ids, &req.target_folder)
        .await?;
    Ok(ApiResponse::ok(AffectedResponse { affected }))
}

/// Copy request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyImagesRequest {
    pub ids: Vec<String>,
    pub target_folder: String,
}

/// Copy rows into a folder under fresh short codes.
pub async fn copy_images(
    State(state): State<AppState>,
    Json(req): Json<CopyImagesRequest>,
) -> AppResult<ApiResponse<AffectedResponse>> {
    let affected = state
        .folder_service
        .copy_images(&req.ids, &req.target_folder)
        .await?;
    Ok(ApiResponse::ok(AffectedResponse { affected }))
}
