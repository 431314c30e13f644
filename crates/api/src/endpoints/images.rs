//! Image listing, retrieval, deletion, statistics and logs.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::IntoResponse,
};
use relaypix_common::AppResult;
use relaypix_core::CatalogStats;
use relaypix_db::entities::{access_log, image};
use relaypix_db::repositories::ImageListFilter;
use serde::{Deserialize, Serialize};

use crate::{response::ApiResponse, state::AppState};

/// Image row as exposed over the API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub id: String,
    pub file_id: String,
    pub short_code: String,
    pub tags: String,
    pub filename: String,
    pub size: i64,
    pub folder: String,
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    pub created_at: String,
}

impl From<image::Model> for ImageResponse {
    fn from(m: image::Model) -> Self {
        Self {
            id: m.id,
            file_id: m.file_id,
            short_code: m.short_code,
            tags: m.tags,
            filename: m.filename,
            size: m.size,
            folder: m.folder,
            content_type: m.content_type,
            expires_at: m.expires_at.map(|t| t.to_rfc3339()),
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

/// Best-effort client address, for the access log only.
pub(crate) fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
}

/// History listing request.
#[derive(Debug, Deserialize)]
pub struct HistoryRequest {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub search: Option<String>,
    pub tag: Option<String>,
    pub filename: Option<String>,
    pub folder: Option<String>,
}

const fn default_page() -> u64 {
    1
}

const fn default_limit() -> u64 {
    20
}

/// Paged history listing with optional filters.
pub async fn history(
    State(state): State<AppState>,
    Query(req): Query<HistoryRequest>,
) -> AppResult<ApiResponse<Vec<ImageResponse>>> {
    let limit = req.limit.clamp(1, 100);
    let filter = ImageListFilter {
        search: req.search,
        tag: req.tag,
        filename: req.filename,
        folder: req.folder,
    };
    let rows = state
        .catalog_service
        .history(req.page.max(1), limit, &filter)
        .await?;
    Ok(ApiResponse::ok(rows.into_iter().map(Into::into).collect()))
}

/// Photo retrieval request.
#[derive(Debug, Deserialize)]
pub struct GetPhotoRequest {
    #[serde(default)]
    pub thumb: Option<String>,
}

/// Proxy raw image bytes back through the relay.
pub async fn get_photo(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    Query(req): Query<GetPhotoRequest>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let thumb = req.thumb.as_deref() == Some("1");
    let ip = client_ip(&headers);
    let (bytes, content_type) = state
        .catalog_service
        .get_photo(&file_id, thumb, ip.as_deref())
        .await?;

    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}

/// Batch delete request.
#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub ids: Vec<String>,
}

/// Delete response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub deleted: u64,
}

/// Delete catalog rows by id.
pub async fn delete_images(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DeleteRequest>,
) -> AppResult<ApiResponse<DeleteResponse>> {
    let ip = client_ip(&headers);
    let deleted = state
        .catalog_service
        .delete_images(&req.ids, ip.as_deref())
        .await?;
    Ok(ApiResponse::ok(DeleteResponse { deleted }))
}

/// Catalog statistics.
pub async fn stats(State(state): State<AppState>) -> AppResult<ApiResponse<CatalogStats>> {
    let stats = state.catalog_service.stats().await?;
    Ok(ApiResponse::ok(stats))
}

/// Access log listing request.
#[derive(Debug, Deserialize)]
pub struct LogsRequest {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_logs_limit")]
    pub limit: u64,
}

const fn default_logs_limit() -> u64 {
    20
}

/// Access log entry as exposed over the API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogResponse {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub file_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub created_at: String,
}

impl From<access_log::Model> for LogResponse {
    fn from(m: access_log::Model) -> Self {
        Self {
            id: m.id,
            kind: m.kind,
            file_id: m.file_id,
            ip: m.ip,
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

/// Paged access log listing.
pub async fn logs(
    State(state): State<AppState>,
    Query(req): Query<LogsRequest>,
) -> AppResult<ApiResponse<Vec<LogResponse>>> {
    let limit = req.limit.clamp(1, 100);
    let rows = state.catalog_service.logs(req.page.max(1), limit).await?;
    Ok(ApiResponse::ok(rows.into_iter().map(Into::into).collect()))
}
