//! API integration tests.
//!
//! These tests verify routing, validation and the response envelope against
//! a mock database; paths that must hit a real catalog are covered by the
//! db crate's integration tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use relaypix_api::{AppState, router as api_router};
use relaypix_common::{AppError, AppResult};
use relaypix_core::{
    CatalogService, DedupService, FolderService, RelayObject, RelayStore,
};
use relaypix_db::repositories::{AccessLogRepository, ImageRepository};
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
use tower::ServiceExt;

/// Relay double; none of these tests should reach the relay.
struct NullRelay;

#[async_trait]
impl RelayStore for NullRelay {
    async fn send_photo(
        &self,
        _data: Vec<u8>,
        _filename: &str,
        _content_type: &str,
    ) -> AppResult<RelayObject> {
        Err(AppError::Relay("relay unavailable in tests".to_string()))
    }

    async fn fetch(&self, _file_id: &str) -> AppResult<Vec<u8>> {
        Err(AppError::Relay("relay unavailable in tests".to_string()))
    }
}

fn create_mock_db() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection()
}

fn create_test_state() -> AppState {
    let db = Arc::new(create_mock_db());
    let image_repo = ImageRepository::new(Arc::clone(&db));
    let log_repo = AccessLogRepository::new(Arc::clone(&db));
    let relay: Arc<dyn RelayStore> = Arc::new(NullRelay);

    AppState {
        catalog_service: CatalogService::new(
            image_repo.clone(),
            log_repo,
            Arc::clone(&relay),
        ),
        folder_service: FolderService::new(image_repo.clone()),
        dedup_service: DedupService::new(image_repo, relay),
    }
}

fn create_test_router() -> Router {
    api_router().with_state(create_test_state())
}

#[tokio::test]
async fn test_rename_with_illegal_segment_is_rejected() {
    let app = create_test_router();

    // Validation runs before any statement touches the catalog.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/folders/rename")
                .method("POST")
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"oldPath":"/a b/","newPath":"/c/"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_root_folder_cannot_be_deleted() {
    let app = create_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/folders/delete")
                .method("POST")
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"path":"/"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_move_with_illegal_target_is_rejected() {
    let app = create_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/folders/move")
                .method("POST")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    r#"{"ids":["x"],"targetFolder":"/ill egal/"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_without_photo_is_rejected() {
    let app = create_test_router();

    let boundary = "X-RELAYPIX-TEST";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"expire\"\r\n\r\nforever\r\n--{boundary}--\r\n"
    );

    let response = app
        .oneshot(
            Request::builder()
                .uri("/upload")
                .method("POST")
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_with_invalid_expire_is_rejected() {
    let app = create_test_router();

    let boundary = "X-RELAYPIX-TEST";
    let body = format!(
        concat!(
            "--{b}\r\n",
            "Content-Disposition: form-data; name=\"photo\"; filename=\"a.png\"\r\n",
            "Content-Type: image/png\r\n\r\n",
            "fakebytes\r\n",
            "--{b}\r\n",
            "Content-Disposition: form-data; name=\"expire\"\r\n\r\n",
            "2\r\n",
            "--{b}--\r\n"
        ),
        b = boundary
    );

    let response = app
        .oneshot(
            Request::builder()
                .uri("/upload")
                .method("POST")
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_returns_a_response() {
    let app = create_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/history?page=1&limit=5")
                .method("GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // With a mock DB the query may fail; either way the route resolves.
    let status = response.status();
    assert!(status == StatusCode::OK || status == StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = create_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/does-not-exist")
                .method("GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
