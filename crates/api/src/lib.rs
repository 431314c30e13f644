//! HTTP API layer for relaypix.
//!
//! This crate provides the REST API:
//!
//! - **Endpoints**: upload intake, listings, folder lifecycle, dedup trigger
//! - **Response envelope**: the `status: success | error` wire format
//! - **State**: the shared service container handlers run against
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod response;
pub mod state;

pub use endpoints::router;
pub use response::ApiResponse;
pub use state::AppState;
