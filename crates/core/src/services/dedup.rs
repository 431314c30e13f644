//! Batch deduplication job.
//!
//! Re-downloads each candidate blob through the relay, recomputes its
//! digest, groups by digest and deletes every non-representative row. The
//! client-side in-batch dedup is only an optimization; this job is the
//! authoritative cleanup and must stay idempotent across runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use relaypix_common::{AppError, AppResult, ContentHasher};
use relaypix_db::{entities::image, repositories::ImageRepository};
use tokio::sync::Semaphore;

use crate::services::relay::RelayStore;

/// Bounded concurrency for relay fetch + hash.
const MAX_FETCH_CONCURRENCY: usize = 6;

/// Page size while enumerating the whole catalog.
const ENUMERATE_PAGE_SIZE: u64 = 200;

/// Outcome of a dedup run.
///
/// "Nothing to do" is distinct from an execution error so operators don't
/// mistake one for the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupOutcome {
    /// Every candidate had unique content.
    NoDuplicates,
    /// Duplicates were found and removed.
    Deleted {
        /// Number of rows deleted.
        count: u64,
        /// The duplicate groups, keeper first.
        groups: Vec<Vec<String>>,
    },
}

/// One candidate that was fetched and hashed successfully.
#[derive(Debug, Clone)]
struct HashedCandidate {
    id: String,
    digest: String,
    created_at: chrono::DateTime<chrono::FixedOffset>,
}

/// Group candidates by digest and pick the rows to delete.
///
/// Within a group the earliest-created row (ties broken by id) is retained;
/// the rest are victims. Returns `(victims, groups)` with each group listed
/// keeper-first.
fn select_victims(mut candidates: Vec<HashedCandidate>) -> (Vec<String>, Vec<Vec<String>>) {
    use std::collections::BTreeMap;

    // Stable order independent of fetch completion order.
    candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let mut by_digest: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for c in candidates {
        by_digest.entry(c.digest).or_default().push(c.id);
    }

    let mut victims = Vec::new();
    let mut groups = Vec::new();
    for (_, members) in by_digest {
        if members.len() > 1 {
            victims.extend(members.iter().skip(1).cloned());
            groups.push(members);
        }
    }

    (victims, groups)
}

/// Server-side deduplication job.
#[derive(Clone)]
pub struct DedupService {
    image_repo: ImageRepository,
    relay: Arc<dyn RelayStore>,
    hasher: ContentHasher,
}

impl DedupService {
    /// Create a new dedup service.
    #[must_use]
    pub fn new(image_repo: ImageRepository, relay: Arc<dyn RelayStore>) -> Self {
        Self {
            image_repo,
            relay,
            hasher: ContentHasher::new(),
        }
    }

    /// Run the job over the whole catalog, or over the given id subset.
    ///
    /// A failed fetch/hash excludes that candidate from grouping (unknown
    /// content is never deleted). Only enumeration or the final batched
    /// delete failing aborts the job.
    pub async fn run(&self, ids: Option<Vec<String>>) -> AppResult<DedupOutcome> {
        let candidates = match ids {
            Some(ids) => self.image_repo.find_by_ids(&ids).await?,
            None => self.enumerate_all().await?,
        };

        if candidates.is_empty() {
            return Ok(DedupOutcome::NoDuplicates);
        }

        let total = candidates.len();
        let hashed = self.hash_candidates(candidates).await;
        tracing::info!(
            hashed = hashed.len(),
            total,
            "Dedup candidates fetched and hashed"
        );

        let (victims, groups) = select_victims(hashed);
        if victims.is_empty() {
            return Ok(DedupOutcome::NoDuplicates);
        }

        let count = self.image_repo.delete_many(&victims).await?;
        tracing::info!(deleted = count, groups = groups.len(), "Dedup complete");

        Ok(DedupOutcome::Deleted { count, groups })
    }

    async fn enumerate_all(&self) -> AppResult<Vec<image::Model>> {
        let mut all = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let page = self
                .image_repo
                .enumerate_page(after.as_deref(), ENUMERATE_PAGE_SIZE)
                .await?;
            if page.is_empty() {
                break;
            }
            after = page.last().map(|m| m.id.clone());
            all.extend(page);
        }

        Ok(all)
    }

    /// Fetch and hash candidates under bounded concurrency.
    ///
    /// Individual failures are logged and dropped; the candidate is simply
    /// excluded from grouping.
    async fn hash_candidates(&self, candidates: Vec<image::Model>) -> Vec<HashedCandidate> {
        let semaphore = Arc::new(Semaphore::new(MAX_FETCH_CONCURRENCY));
        let completed = Arc::new(AtomicUsize::new(0));
        let total = candidates.len();
        let mut handles = Vec::with_capacity(total);

        for candidate in candidates {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let relay = Arc::clone(&self.relay);
            let hasher = self.hasher;
            let completed = Arc::clone(&completed);

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let result = relay.fetch(&candidate.file_id).await;
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(done, total, id = %candidate.id, "Dedup progress");

                match result {
                    Ok(bytes) => Some(HashedCandidate {
                        id: candidate.id,
                        digest: hasher.hash_bytes(&bytes),
                        created_at: candidate.created_at,
                    }),
                    Err(e) => {
                        tracing::warn!(
                            id = %candidate.id,
                            file_id = %candidate.file_id,
                            error = %e,
                            "Skipping candidate, fetch failed"
                        );
                        None
                    }
                }
            }));
        }

        let mut hashed = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Some(candidate)) => hashed.push(candidate),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Dedup hash task panicked");
                }
            }
        }
        hashed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::services::relay::RelayObject;

    fn at(secs: i64) -> chrono::DateTime<chrono::FixedOffset> {
        chrono::DateTime::from_timestamp(secs, 0).unwrap().into()
    }

    fn candidate(id: &str, digest: &str, secs: i64) -> HashedCandidate {
        HashedCandidate {
            id: id.to_string(),
            digest: digest.to_string(),
            created_at: at(secs),
        }
    }

    #[test]
    fn test_select_victims_keeps_earliest_member() {
        let (victims, groups) = select_victims(vec![
            candidate("b", "X", 20),
            candidate("a", "X", 10),
            candidate("c", "Y", 5),
        ]);

        assert_eq!(victims, vec!["b".to_string()]);
        assert_eq!(groups, vec![vec!["a".to_string(), "b".to_string()]]);
    }

    #[test]
    fn test_select_victims_no_duplicates() {
        let (victims, groups) =
            select_victims(vec![candidate("a", "X", 1), candidate("b", "Y", 2)]);
        assert!(victims.is_empty());
        assert!(groups.is_empty());
    }

    #[test]
    fn test_select_victims_ties_break_by_id() {
        let (victims, _) = select_victims(vec![
            candidate("b", "X", 10),
            candidate("a", "X", 10),
        ]);
        // Same timestamp: the lower id wins.
        assert_eq!(victims, vec!["b".to_string()]);
    }

    #[test]
    fn test_select_victims_three_way_group() {
        let (victims, groups) = select_victims(vec![
            candidate("a", "X", 1),
            candidate("b", "X", 2),
            candidate("c", "X", 3),
        ]);
        assert_eq!(victims, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0][0], "a");
    }

    /// In-memory relay for exercising the fetch+hash stage.
    struct MemoryRelay {
        blobs: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemoryRelay {
        fn with(blobs: Vec<(&str, &[u8])>) -> Arc<Self> {
            Arc::new(Self {
                blobs: Mutex::new(
                    blobs
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v.to_vec()))
                        .collect(),
                ),
            })
        }
    }

    #[async_trait]
    impl RelayStore for MemoryRelay {
        async fn send_photo(
            &self,
            _data: Vec<u8>,
            _filename: &str,
            _content_type: &str,
        ) -> AppResult<RelayObject> {
            Err(AppError::Relay("not supported in tests".to_string()))
        }

        async fn fetch(&self, file_id: &str) -> AppResult<Vec<u8>> {
            self.blobs
                .lock()
                .unwrap()
                .get(file_id)
                .cloned()
                .ok_or_else(|| AppError::Relay(format!("unknown reference: {file_id}")))
        }
    }

    fn model(id: &str, file_id: &str, secs: i64) -> image::Model {
        image::Model {
            id: id.to_string(),
            file_id: file_id.to_string(),
            thumb_file_id: None,
            short_code: format!("sc-{id}"),
            tags: "default".to_string(),
            filename: format!("{id}.jpg"),
            size: 3,
            folder: "/".to_string(),
            content_type: "image/jpeg".to_string(),
            digest: None,
            expires_at: None,
            created_at: at(secs),
        }
    }

    fn service_with_relay(relay: Arc<MemoryRelay>) -> DedupService {
        use sea_orm::{DatabaseBackend, MockDatabase};
        // The repo is unused by hash_candidates; a mock connection is enough.
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        DedupService::new(ImageRepository::new(Arc::new(db)), relay)
    }

    #[tokio::test]
    async fn test_hash_candidates_groups_identical_content() {
        let relay = MemoryRelay::with(vec![
            ("f1", b"same bytes"),
            ("f2", b"same bytes"),
            ("f3", b"other bytes"),
        ]);
        let service = service_with_relay(relay);

        let hashed = service
            .hash_candidates(vec![
                model("a", "f1", 1),
                model("b", "f2", 2),
                model("c", "f3", 3),
            ])
            .await;

        assert_eq!(hashed.len(), 3);
        let (victims, groups) = select_victims(hashed);
        assert_eq!(victims, vec!["b".to_string()]);
        assert_eq!(groups, vec![vec!["a".to_string(), "b".to_string()]]);
    }

    #[tokio::test]
    async fn test_failed_fetch_excludes_candidate() {
        let relay = MemoryRelay::with(vec![("f1", b"bytes")]);
        let service = service_with_relay(relay);

        let hashed = service
            .hash_candidates(vec![model("a", "f1", 1), model("b", "missing", 2)])
            .await;

        // The unreadable candidate is excluded, never grouped or deleted.
        assert_eq!(hashed.len(), 1);
        assert_eq!(hashed[0].id, "a");
    }
}
