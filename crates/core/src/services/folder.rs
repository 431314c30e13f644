//! Folder lifecycle service.
//!
//! Folders are virtual: a folder is the distinct set of `folder` path values
//! across catalog rows. `/a/b/` implies the existence of `/a/` even when no
//! row sits there directly.

use once_cell::sync::Lazy;
use regex::Regex;
use relaypix_common::{AppError, AppResult, IdGenerator};
use relaypix_db::{entities::image, repositories::ImageRepository};
use sea_orm::Set;

/// Permitted characters for one path segment: ASCII letters, digits,
/// underscore, hyphen, and CJK letters.
static SEGMENT_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a literal
    Regex::new(r"^[A-Za-z0-9_\-\x{4E00}-\x{9FA5}]+$").unwrap()
});

/// How many short-code generation attempts before giving up.
const SHORT_CODE_ATTEMPTS: usize = 5;

/// Normalize a folder path so it begins and ends with `/`.
#[must_use]
pub fn normalize_folder_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    format!("/{trimmed}/")
}

/// Validate every segment of a folder path.
///
/// Runs before any statement touches the catalog; a violating segment
/// rejects the whole operation.
pub fn validate_folder_path(path: &str) -> AppResult<()> {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        // Root folder.
        return Ok(());
    }
    for segment in trimmed.split('/') {
        if !SEGMENT_RE.is_match(segment) {
            return Err(AppError::Validation(format!(
                "illegal folder path segment: {segment:?}"
            )));
        }
    }
    Ok(())
}

/// Expand a set of folder paths with all implied ancestors.
fn with_ancestors(paths: Vec<String>) -> Vec<String> {
    let mut all: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    for path in paths {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        if segments.len() == 1 && segments[0].is_empty() {
            all.insert("/".to_string());
            continue;
        }
        let mut acc = String::from("/");
        for segment in segments {
            acc.push_str(segment);
            acc.push('/');
            all.insert(acc.clone());
        }
    }
    all.insert("/".to_string());
    all.into_iter().collect()
}

/// Folder lifecycle service.
#[derive(Clone)]
pub struct FolderService {
    image_repo: ImageRepository,
    id_gen: IdGenerator,
}

impl FolderService {
    /// Create a new folder service.
    #[must_use]
    pub const fn new(image_repo: ImageRepository) -> Self {
        Self {
            image_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Distinct folder paths across the catalog, ancestors included.
    pub async fn list(&self) -> AppResult<Vec<String>> {
        let stored = self.image_repo.list_folders().await?;
        Ok(with_ancestors(stored))
    }

    /// Move the given rows into `target`.
    pub async fn move_images(&self, ids: &[String], target: &str) -> AppResult<u64> {
        validate_folder_path(target)?;
        let target = normalize_folder_path(target);
        self.image_repo.move_to_folder(ids, &target).await
    }

    /// Copy the given rows into `target` under freshly generated short codes.
    ///
    /// Tags, filename, size and digest are preserved; ids and short codes
    /// are new. All inserts run inside one transaction.
    pub async fn copy_images(&self, ids: &[String], target: &str) -> AppResult<u64> {
        validate_folder_path(target)?;
        let target = normalize_folder_path(target);

        let originals = self.image_repo.find_by_ids(ids).await?;
        if originals.is_empty() {
            return Ok(0);
        }

        let mut copies = Vec::with_capacity(originals.len());
        for original in originals {
            let short_code = self.fresh_short_code().await?;
            copies.push(image::ActiveModel {
                id: Set(self.id_gen.generate()),
                file_id: Set(original.file_id),
                thumb_file_id: Set(original.thumb_file_id),
                short_code: Set(short_code),
                tags: Set(original.tags),
                filename: Set(original.filename),
                size: Set(original.size),
                folder: Set(target.clone()),
                content_type: Set(original.content_type),
                digest: Set(original.digest),
                expires_at: Set(original.expires_at),
                created_at: Set(chrono::Utc::now().into()),
            });
        }

        self.image_repo.insert_many(copies).await
    }

    /// Rename a folder subtree.
    pub async fn rename(&self, old_path: &str, new_path: &str) -> AppResult<u64> {
        validate_folder_path(old_path)?;
        validate_folder_path(new_path)?;

        let old_path = normalize_folder_path(old_path);
        let new_path = normalize_folder_path(new_path);

        if old_path == "/" {
            return Err(AppError::BadRequest(
                "the root folder cannot be renamed".to_string(),
            ));
        }
        if old_path == new_path {
            return Ok(0);
        }

        let affected = self.image_repo.rename_folder(&old_path, &new_path).await?;
        tracing::info!(old = %old_path, new = %new_path, affected, "Renamed folder");
        Ok(affected)
    }

    /// Delete a folder subtree and every record in it.
    pub async fn delete(&self, path: &str) -> AppResult<u64> {
        validate_folder_path(path)?;
        let path = normalize_folder_path(path);

        if path == "/" {
            return Err(AppError::BadRequest(
                "the root folder cannot be deleted".to_string(),
            ));
        }

        let deleted = self.image_repo.delete_folder(&path).await?;
        tracing::info!(path = %path, deleted, "Deleted folder");
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
    fn test_normalize_folder_path() {
        assert_eq!(normalize_folder_path("a/b"), "/a/b/");
        assert_eq!(normalize_folder_path("/a/b/"), "/a/b/");
        assert_eq!(normalize_folder_path("a"), "/a/");
        assert_eq!(normalize_folder_path(""), "/");
        assert_eq!(normalize_folder_path("/"), "/");
        assert_eq!(normalize_folder_path("  /a/  "), "/a/");
    }

    #[test]
    fn test_validate_accepts_word_characters() {
        assert!(validate_folder_path("/photos_2024/").is_ok());
        assert!(validate_folder_path("/a/b/c/").is_ok());
        assert!(validate_folder_path("/").is_ok());
        assert!(validate_folder_path("cat-pics").is_ok());
    }

    #[test]
    fn test_validate_accepts_cjk_segments() {
        assert!(validate_folder_path("/相册/").is_ok());
        assert!(validate_folder_path("/相册/风景/").is_ok());
    }

    #[test]
    fn test_validate_rejects_illegal_segments() {
        assert!(validate_folder_path("/a b/").is_err());
        assert!(validate_folder_path("/a%b/").is_err());
        assert!(validate_folder_path("/a.b/").is_err());
        assert!(validate_folder_path("/семья/").is_err());
    }

    #[test]
    fn test_with_ancestors_implies_parents() {
        let folders = with_ancestors(vec!["/a/b/".to_string()]);
        assert_eq!(
            folders,
            vec!["/".to_string(), "/a/".to_string(), "/a/b/".to_string()]
        );
    }

    #[test]
    fn test_with_ancestors_deduplicates() {
        let folders = with_ancestors(vec!["/a/".to_string(), "/a/b/".to_string()]);
        assert_eq!(
            folders,
            vec!["/".to_string(), "/a/".to_string(), "/a/b/".to_string()]
        );
    }
}
