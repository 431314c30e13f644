//! API endpoints.

pub mod dedup;
pub mod folders;
pub mod images;
pub mod upload;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Build the API router.
#[must_use]
pub fn router() -> Router<AppState> {
    Router::new()
        // Upload
        .route("/upload", post(upload::upload_image))
        // Images
        .route("/history", get(images::history))
        .route("/get_photo/{file_id}", get(images::get_photo))
        .route("/delete", post(images::delete_images))
        .route("/stats", get(images::stats))
        .route("/logs", get(images::logs))
        // Folders
        .route("/folders", get(folders::list_folders))
        .route("/folders/rename", post(folders::rename_folder))
        .route("/folders/delete", post(folders::delete_folder))
        .route("/folders/move", post(folders::move_images))
        .route("/folders/copy", post(folders::copy_images))
        // Deduplication
        .route("/dedup", post(dedup::run_dedup))
}
