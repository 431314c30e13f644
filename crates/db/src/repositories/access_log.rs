//! Access log repository.

use std::sync::Arc;

use crate::entities::{AccessLog, access_log};
use relaypix_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

/// Access log repository for database operations.
#[derive(Clone)]
pub struct AccessLogRepository {
    db: Arc<DatabaseConnection>,
}

impl AccessLogRepository {
    /// Create a new access log repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Record an event.
    pub async fn record(
        &self,
        kind: &str,
        file_id: &str,
        ip: Option<&str>,
    ) -> AppResult<access_log::Model> {
        let model = access_log::ActiveModel {
            kind: Set(kind.to_string()),
            file_id: Set(file_id.to_string()),
            ip: Set(ip.map(std::string::ToString::to_string)),
            created_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        };

        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Paged listing ordered newest-first.
    pub async fn find_page(&self, page: u64, limit: u64) -> AppResult<Vec<access_log::Model>> {
        AccessLog::find()
            .order_by_desc(access_log::Column::CreatedAt)
            .offset(page.saturating_sub(1) * limit)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Most-viewed relay references, with view counts, highest first.
    pub async fn top_viewed(&self, limit: u64) -> AppResult<Vec<(String, i64)>> {
        use sea_orm::FromQueryResult;

        #[derive(FromQueryResult)]
        struct ViewCount {
            file_id: String,
            views: i64,
        }

        let rows = AccessLog::find()
            .filter(access_log::Column::Kind.eq("view"))
            .select_only()
            .column(access_log::Column::FileId)
            .column_as(access_log::Column::Id.count(), "views")
            .group_by(access_log::Column::FileId)
            .order_by_desc(access_log::Column::Id.count())
            .limit(limit)
            .into_model::<ViewCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|r| (r.file_id, r.views)).collect())
    }
}
