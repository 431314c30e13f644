//! Shared application state.

use relaypix_core::{CatalogService, DedupService, FolderService};

/// Application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Upload intake, listings, deletion, statistics.
    pub catalog_service: CatalogService,
    /// Folder lifecycle operations.
    pub folder_service: FolderService,
    /// Server-side deduplication job.
    pub dedup_service: DedupService,
}
