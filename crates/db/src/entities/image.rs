//! Image entity (one row per hosted image).
//!
//! The raw bytes live at the relay; this row only carries the opaque
//! references, placement and dedup metadata.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "images")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Opaque relay reference to the full-size object
    pub file_id: String,

    /// Opaque relay reference to the thumbnail-sized object
    #[sea_orm(nullable)]
    pub thumb_file_id: Option<String>,

    /// Compact unique code used to build direct links
    #[sea_orm(unique)]
    pub short_code: String,

    /// Comma-joined tag list, never empty
    pub tags: String,

    /// Original file name as declared by the uploader
    pub filename: String,

    /// File size in bytes
    pub size: i64,

    /// Folder path; always begins and ends with `/`
    #[sea_orm(indexed)]
    pub folder: String,

    /// MIME type
    pub content_type: String,

    /// Content digest; dedup grouping key only, never a primary key
    #[sea_orm(nullable, indexed)]
    pub digest: Option<String>,

    /// Expiry timestamp; null means the image is kept forever
    #[sea_orm(nullable)]
    pub expires_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
