//! Business logic services.

pub mod catalog;
pub mod dedup;
pub mod folder;
pub mod media;
pub mod relay;

pub use catalog::{
    CatalogService, CatalogStats, DEFAULT_TAG, ExpirePolicy, HotImage, StoreImageInput,
    UploadImageInput,
};
pub use dedup::{DedupOutcome, DedupService};
pub use folder::{FolderService, normalize_folder_path, validate_folder_path};
pub use media::{CompressionPolicy, compress_image};
pub use relay::{RelayObject, RelayStore, TelegramRelay, parse_retry_after};
