//! Catalog service: upload intake, listings, deletion, statistics.

use std::sync::Arc;

use relaypix_common::{AppError, AppResult, ContentHasher, IdGenerator};
use relaypix_db::{
    entities::{access_log, image},
    repositories::{AccessLogRepository, ImageListFilter, ImageRepository},
};
use sea_orm::Set;

use crate::services::folder::{normalize_folder_path, validate_folder_path};
use crate::services::relay::RelayStore;

/// Sentinel tag assigned when the uploader picked none.
pub const DEFAULT_TAG: &str = "default";

/// How many short-code generation attempts before giving up.
const SHORT_CODE_ATTEMPTS: usize = 5;

/// Expiry policy for an uploaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirePolicy {
    /// Keep forever.
    Forever,
    /// Keep for the given number of days.
    Days(i64),
}

impl ExpirePolicy {
    /// Parse the wire representation: `forever`, `1`, `7` or `30`.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "forever" | "" => Ok(Self::Forever),
            "1" => Ok(Self::Days(1)),
            "7" => Ok(Self::Days(7)),
            "30" => Ok(Self::Days(30)),
            other => Err(AppError::Validation(format!(
                "invalid expire policy: {other:?}"
            ))),
        }
    }

    /// Expiry timestamp relative to now, if any.
    #[must_use]
    pub fn expires_at(self) -> Option<chrono::DateTime<chrono::Utc>> {
        match self {
            Self::Forever => None,
            Self::Days(days) => Some(chrono::Utc::now() + chrono::Duration::days(days)),
        }
    }
}

/// Input for a full upload: relay forward plus catalog insert.
pub struct UploadImageInput {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Declared file name.
    pub filename: String,
    /// MIME type.
    pub content_type: String,
    /// Selected tags; empty falls back to the sentinel tag.
    pub tags: Vec<String>,
    /// Target folder path.
    pub folder: String,
    /// Expiry policy.
    pub expire: ExpirePolicy,
    /// Content digest computed by the client, if it sent one.
    pub digest: Option<String>,
    /// Client address for the access log.
    pub ip: Option<String>,
}

/// Input for inserting a catalog row for an already-relayed blob.
pub struct StoreImageInput {
    /// Relay reference to the full-size object.
    pub file_id: String,
    /// Relay reference to the thumbnail object.
    pub thumb_file_id: Option<String>,
    /// Comma-joined tag list.
    pub tags: String,
    /// Declared file name.
    pub filename: String,
    /// Size in bytes.
    pub size: i64,
    /// Normalized folder path.
    pub folder: String,
    /// MIME type.
    pub content_type: String,
    /// Content digest.
    pub digest: Option<String>,
    /// Expiry timestamp.
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Catalog statistics.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    /// Total image count.
    pub total: u64,
    /// Total bytes stored.
    pub size: i64,
    /// Most viewed images.
    pub hot: Vec<HotImage>,
}

/// One most-viewed entry.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotImage {
    /// Relay reference.
    pub file_id: String,
    /// View count.
    pub views: i64,
    /// Short code, when the row still exists.
    pub short_code: Option<String>,
}

/// Catalog service.
#[derive(Clone)]
pub struct CatalogService {
    image_repo: ImageRepository,
    log_repo: AccessLogRepository,
    relay: Arc<dyn RelayStore>,
    id_gen: IdGenerator,
    hasher: ContentHasher,
}

impl CatalogService {
    /// Create a new catalog service.
    #[must_use]
    pub fn new(
        image_repo: ImageRepository,
        log_repo: AccessLogRepository,
        relay: Arc<dyn RelayStore>,
    ) -> Self {
        Self {
            image_repo,
            log_repo,
            relay,
            id_gen: IdGenerator::new(),
            hasher: ContentHasher::new(),
        }
    }

    /// Upload an image: validate, forward to the relay, insert the row.
    ///
    /// The catalog row is only created after the relay accepted the blob, so
    /// a relay failure never leaves orphan metadata. The inverse orphan (a
    /// relayed blob without a row, after a crash between the two steps) is an
    /// accepted failure mode cleaned up by the dedup job or by hand.
    pub async fn upload_image(&self, input: UploadImageInput) -> AppResult<image::Model> {
        if input.data.is_empty() {
            return Err(AppError::Validation("image payload is empty".to_string()));
        }
        if !input.content_type.starts_with("image/") {
            return Err(AppError::Validation(format!(
                "not an image content type: {}",
                input.content_type
            )));
        }
        validate_folder_path(&input.folder)?;
        let folder = normalize_folder_path(&input.folder);

        let tags: Vec<String> = input
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let tags = if tags.is_empty() {
            DEFAULT_TAG.to_string()
        } else {
            tags.join(",")
        };

        let digest = match input.digest {
            Some(d) => d,
            None => self.hasher.hash_bytes(&input.data),
        };
        let size = input.data.len() as i64;

        let object = self
            .relay
            .send_photo(input.data, &input.filename, &input.content_type)
            .await?;

        let model = self
            .store_record(StoreImageInput {
                file_id: object.file_id,
                thumb_file_id: object.thumb_file_id,
                tags,
                filename: input.filename,
                size,
                folder,
                content_type: input.content_type,
                digest: Some(digest),
                expires_at: input.expire.expires_at(),
            })
            .await?;

        self.log_repo
            .record("upload", &model.file_id, input.ip.as_deref())
            .await?;

        tracing::info!(
            id = %model.id,
            short_code = %model.short_code,
            size = model.size,
            "Stored uploaded image"
        );

        Ok(model)
    }

    /// Insert a catalog row for an already-relayed blob.
    pub async fn store_record(&self, input: StoreImageInput) -> AppResult<image::Model> {
        let short_code = self.fresh_short_code().await?;

        let model = image::ActiveModel {
            id: Set(self.id_gen.generate()),
            file_id: Set(input.file_id),
            thumb_file_id: Set(input.thumb_file_id),
            short_code: Set(short_code),
            tags: Set(input.tags),
            filename: Set(input.filename),
            size: Set(input.size),
            folder: Set(input.folder),
            content_type: Set(input.content_type),
            digest: Set(input.digest),
            expires_at: Set(input.expires_at.map(Into::into)),
            created_at: Set(chrono::Utc::now().into()),
        };

        self.image_repo.create(model).await
    }

    /// Paged history listing.
    pub async fn history(
        &self,
        page: u64,
        limit: u64,
        filter: &ImageListFilter,
    ) -> AppResult<Vec<image::Model>> {
        self.image_repo.find_page(page, limit, filter).await
    }

    /// Delete rows by id, in one transaction, and log each deletion.
    pub async fn delete_images(&self, ids: &[String], ip: Option<&str>) -> AppResult<u64> {
        let rows = self.image_repo.find_by_ids(ids).await?;
        let deleted = self.image_repo.delete_many(ids).await?;

        // Remote blobs are intentionally not purged (see the relay contract);
        // only the catalog rows go away.
        for row in rows {
            self.log_repo.record("delete", &row.file_id, ip).await?;
        }

        Ok(deleted)
    }

    /// Fetch image bytes back through the relay and log the view.
    pub async fn get_photo(
        &self,
        file_id: &str,
        thumb: bool,
        ip: Option<&str>,
    ) -> AppResult<(Vec<u8>, String)> {
        let record = self.image_repo.find_by_file_id(file_id).await?;

        let (fetch_id, content_type) = match record {
            Some(ref r) => {
                let fetch_id = if thumb {
                    r.thumb_file_id.clone().unwrap_or_else(|| r.file_id.clone())
                } else {
                    r.file_id.clone()
                };
                (fetch_id, r.content_type.clone())
            }
            // The reference may point at a blob whose row was deleted; the
            // relay is still authoritative for the bytes.
            None => (file_id.to_string(), "image/jpeg".to_string()),
        };

        let bytes = self.relay.fetch(&fetch_id).await?;
        self.log_repo.record("view", file_id, ip).await?;

        Ok((bytes, content_type))
    }

    /// Catalog statistics: totals plus the most-viewed images.
    pub async fn stats(&self) -> AppResult<CatalogStats> {
        let total = self.image_repo.count_all().await?;
        let size = self.image_repo.total_size().await?;

        let mut hot = Vec::new();
        for (file_id, views) in self.log_repo.top_viewed(5).await? {
            let short_code = self
                .image_repo
                .find_by_file_id(&file_id)
                .await?
                .map(|r| r.short_code);
            hot.push(HotImage {
                file_id,
                views,
                short_code,
            });
        }

        Ok(CatalogStats { total, size, hot })
    }

    /// Paged access log listing.
    pub async fn logs(&self, page: u64, limit: u64) -> AppResult<Vec<access_log::Model>> {
        self.log_repo.find_page(page, limit).await
    }

    /// Remove rows whose expiry has passed.
    pub async fn cleanup_expired(&self) -> AppResult<u64> {
        let deleted = self.image_repo.delete_expired().await?;
        if deleted > 0 {
            tracing::info!(deleted, "Removed expired images");
        }
        Ok(deleted)
    }

    async fn fresh_short_code(&self) -> AppResult<String> {
        for _ in 0..SHORT_CODE_ATTEMPTS {
            let code = self.id_gen.generate_short_code();
            if !self.image_repo.short_code_exists(&code).await? {
                return Ok(code);
            }
        }
        Err(AppError::Internal(
            "could not generate a unique short code".to_string(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_expire_policy_parse() {
        assert_eq!(ExpirePolicy::parse("forever").unwrap(), ExpirePolicy::Forever);
        assert_eq!(ExpirePolicy::parse("1").unwrap(), ExpirePolicy::Days(1));
        assert_eq!(ExpirePolicy::parse("7").unwrap(), ExpirePolicy::Days(7));
        assert_eq!(ExpirePolicy::parse("30").unwrap(), ExpirePolicy::Days(30));
        assert!(ExpirePolicy::parse("2").is_err());
        assert!(ExpirePolicy::parse("never").is_err());
    }

    #[test]
    fn test_expire_policy_timestamps() {
        assert!(ExpirePolicy::Forever.expires_at().is_none());

        let seven = ExpirePolicy::Days(7).expires_at().unwrap();
        let delta = seven - chrono::Utc::now();
        assert!(delta.num_days() >= 6 && delta.num_days() <= 7);
    }
}
