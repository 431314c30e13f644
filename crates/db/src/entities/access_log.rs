//! Access log entity (uploads, views, deletions).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "access_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Event kind: `upload`, `view` or `delete`
    pub kind: String,

    /// Relay reference of the image involved
    #[sea_orm(indexed)]
    pub file_id: String,

    /// Client address, when known
    #[sea_orm(nullable)]
    pub ip: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
