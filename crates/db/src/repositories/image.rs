//! Image repository.

use std::sync::Arc;

use crate::entities::{Image, image};
use relaypix_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait, sea_query::Expr,
};

/// Filters for paged image listings.
#[derive(Debug, Clone, Default)]
pub struct ImageListFilter {
    /// Free-text search across filename and tags.
    pub search: Option<String>,
    /// Exact tag match (against the comma-joined tag list).
    pub tag: Option<String>,
    /// Filename substring match.
    pub filename: Option<String>,
    /// Exact folder path.
    pub folder: Option<String>,
}

/// Image repository for database operations.
#[derive(Clone)]
pub struct ImageRepository {
    db: Arc<DatabaseConnection>,
}

impl ImageRepository {
    /// Create a new image repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an image by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<image::Model>> {
        Image::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get an image by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<image::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::ImageNotFound(id.to_string()))
    }

    /// Find images by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<image::Model>> {
        Image::find()
            .filter(image::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an image by its relay reference.
    pub async fn find_by_file_id(&self, file_id: &str) -> AppResult<Option<image::Model>> {
        Image::find()
            .filter(image::Column::FileId.eq(file_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check whether a short code is already taken.
    pub async fn short_code_exists(&self, short_code: &str) -> AppResult<bool> {
        let found = Image::find()
            .filter(image::Column::ShortCode.eq(short_code))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(found.is_some())
    }

    /// Create a new image row.
    pub async fn create(&self, model: image::ActiveModel) -> AppResult<image::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete images by IDs inside one transaction.
    ///
    /// Either every given row is removed or none are.
    pub async fn delete_many(&self, ids: &[String]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let result = Image::delete_many()
            .filter(image::Column::Id.is_in(ids.to_vec()))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Paged listing ordered newest-first, with optional filters.
    ///
    /// Expired rows are excluded.
    pub async fn find_page(
        &self,
        page: u64,
        limit: u64,
        filter: &ImageListFilter,
    ) -> AppResult<Vec<image::Model>> {
        let mut query = Image::find()
            .filter(
                image::Column::ExpiresAt
                    .is_null()
                    .or(image::Column::ExpiresAt.gt(chrono::Utc::now())),
            )
            .order_by_desc(image::Column::CreatedAt);

        if let Some(ref search) = filter.search {
            let pattern = format!("%{search}%");
            query = query.filter(
                image::Column::Filename
                    .like(pattern.clone())
                    .or(image::Column::Tags.like(pattern)),
            );
        }
        if let Some(ref tag) = filter.tag {
            query = query.filter(image::Column::Tags.like(format!("%{tag}%")));
        }
        if let Some(ref filename) = filter.filename {
            query = query.filter(image::Column::Filename.like(format!("%{filename}%")));
        }
        if let Some(ref folder) = filter.folder {
            query = query.filter(image::Column::Folder.eq(folder.clone()));
        }

        query
            .offset(page.saturating_sub(1) * limit)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Enumerate the whole catalog a page at a time, ordered by id.
    ///
    /// Used by the dedup job; keyset pagination so a long scan stays stable
    /// while rows are inserted concurrently.
    pub async fn enumerate_page(
        &self,
        after_id: Option<&str>,
        limit: u64,
    ) -> AppResult<Vec<image::Model>> {
        let mut query = Image::find().order_by_asc(image::Column::Id);

        if let Some(id) = after_id {
            query = query.filter(image::Column::Id.gt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Total image count, excluding expired rows.
    pub async fn count_all(&self) -> AppResult<u64> {
        use sea_orm::PaginatorTrait;

        Image::find()
            .filter(
                image::Column::ExpiresAt
                    .is_null()
                    .or(image::Column::ExpiresAt.gt(chrono::Utc::now())),
            )
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Total bytes stored, excluding expired rows.
    pub async fn total_size(&self) -> AppResult<i64> {
        use sea_orm::FromQueryResult;

        #[derive(FromQueryResult)]
        struct SumResult {
            total: Option<i64>,
        }

        let result = Image::find()
            .filter(
                image::Column::ExpiresAt
                    .is_null()
                    .or(image::Column::ExpiresAt.gt(chrono::Utc::now())),
            )
            .select_only()
            .column_as(image::Column::Size.sum(), "total")
            .into_model::<SumResult>()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.and_then(|r| r.total).unwrap_or(0))
    }

    /// Delete rows whose expiry timestamp has passed.
    pub async fn delete_expired(&self) -> AppResult<u64> {
        let result = Image::delete_many()
            .filter(image::Column::ExpiresAt.lte(chrono::Utc::now()))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    // ==================== Folder operations ====================

    /// Distinct folder paths across the catalog.
    pub async fn list_folders(&self) -> AppResult<Vec<String>> {
        use sea_orm::FromQueryResult;

        #[derive(FromQueryResult)]
        struct FolderRow {
            folder: String,
        }

        let rows = Image::find()
            .select_only()
            .column(image::Column::Folder)
            .distinct()
            .order_by_asc(image::Column::Folder)
            .into_model::<FolderRow>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|r| r.folder).collect())
    }

    /// Rewrite the folder field of exactly the given ids.
    pub async fn move_to_folder(&self, ids: &[String], target: &str) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let result = Image::update_many()
            .col_expr(image::Column::Folder, Expr::value(target))
            .filter(image::Column::Id.is_in(ids.to_vec()))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Insert a batch of rows inside one transaction.
    ///
    /// Used by the copy operation; the caller has already assigned fresh ids
    /// and short codes.
    pub async fn insert_many(&self, models: Vec<image::ActiveModel>) -> AppResult<u64> {
        if models.is_empty() {
            return Ok(0);
        }

        let count = models.len() as u64;
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        for model in models {
            model
                .insert(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count)
    }

    /// Rows at `path` or under any descendant path.
    ///
    /// The LIKE prefix scan treats `_` as a wildcard, so matches are
    /// re-checked with an exact prefix comparison before being returned.
    pub async fn find_in_folder_tree(&self, path: &str) -> AppResult<Vec<image::Model>> {
        let rows = Image::find()
            .filter(image::Column::Folder.like(format!("{path}%")))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter(|r| r.folder.starts_with(path))
            .collect())
    }

    /// Rename a folder subtree: every row whose folder equals `old_path` or
    /// descends from it gets the prefix rewritten to `new_path`.
    ///
    /// Runs as a single transaction; any statement failure rolls the whole
    /// rename back.
    pub async fn rename_folder(&self, old_path: &str, new_path: &str) -> AppResult<u64> {
        let rows = self.find_in_folder_tree(old_path).await?;
        if rows.is_empty() {
            return Ok(0);
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut affected = 0u64;
        for row in rows {
            let rewritten = format!("{new_path}{}", &row.folder[old_path.len()..]);
            let mut model: image::ActiveModel = row.into();
            model.folder = Set(rewritten);
            model
                .update(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            affected += 1;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(affected)
    }

    /// Delete every row at `path` or any descendant path, in one transaction.
    pub async fn delete_folder(&self, path: &str) -> AppResult<u64> {
        let rows = self.find_in_folder_tree(path).await?;
        if rows.is_empty() {
            return Ok(0);
        }

        let ids: Vec<String> = rows.into_iter().map(|r| r.id).collect();
        self.delete_many(&ids).await
    }
}
