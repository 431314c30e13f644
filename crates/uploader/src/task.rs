//! Upload tasks and their lifecycle.

use std::path::PathBuf;

use bytes::Bytes;
use relaypix_common::{AppError, AppResult, ContentHasher};

/// Where a task's bytes come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// A file on disk, streamed for hashing.
    Path(PathBuf),
    /// An in-memory blob (drag-drop, paste, tests).
    Memory(Bytes),
}

impl FileSource {
    /// Byte length of the source.
    pub async fn len(&self) -> AppResult<u64> {
        match self {
            Self::Path(path) => {
                let meta = tokio::fs::metadata(path)
                    .await
                    .map_err(|e| AppError::BadRequest(format!("unreadable file: {e}")))?;
                Ok(meta.len())
            }
            Self::Memory(bytes) => Ok(bytes.len() as u64),
        }
    }

    /// Whether the source is empty.
    pub async fn is_empty(&self) -> AppResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Compute the content digest, streaming from disk where possible.
    pub async fn digest(&self, hasher: &ContentHasher) -> AppResult<String> {
        match self {
            Self::Path(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| AppError::Hashing(format!("open failed: {e}")))?;
                hasher.hash_reader(file).await
            }
            Self::Memory(bytes) => Ok(hasher.hash_bytes(bytes)),
        }
    }

    /// Load the full payload for compression or upload.
    pub async fn read_all(&self) -> AppResult<Vec<u8>> {
        match self {
            Self::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|e| AppError::BadRequest(format!("unreadable file: {e}"))),
            Self::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }
}

/// Lifecycle state of one task.
///
/// No transition skips `Hashing`; `Done` and `Failed` are terminal, and a
/// failed task stays visible so the user can retry it in a later batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting for a worker.
    Queued,
    /// Content digest being computed.
    Hashing,
    /// Oversized payload being re-encoded.
    Compressing,
    /// Request in flight.
    Uploading,
    /// Uploaded, or resolved as a duplicate of a sibling.
    Done,
    /// Terminal failure; kept for manual retry/removal.
    Failed,
}

impl TaskState {
    /// Whether the state is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// One file awaiting or undergoing upload.
///
/// Owned exclusively by its batch; no task is shared across workers.
#[derive(Debug, Clone)]
pub struct UploadTask {
    /// Byte source.
    pub source: FileSource,
    /// Declared file name.
    pub filename: String,
    /// Declared byte length.
    pub size: u64,
    /// MIME type.
    pub content_type: String,
    /// Assigned tags; empty means the server applies its sentinel tag.
    pub tags: Vec<String>,
    /// Target folder path.
    pub folder: String,
    /// Expiry policy wire value (`forever`, `1`, `7`, `30`).
    pub expire: String,
    /// Lifecycle state.
    pub state: TaskState,
    /// Failure detail once `state` is `Failed`.
    pub error: Option<String>,
}

impl UploadTask {
    /// Create a task in the `Queued` state.
    #[must_use]
    pub fn new(source: FileSource, filename: String, size: u64, content_type: String) -> Self {
        Self {
            source,
            filename,
            size,
            content_type,
            tags: Vec::new(),
            folder: "/".to_string(),
            expire: "forever".to_string(),
            state: TaskState::Queued,
            error: None,
        }
    }

    /// Cheap pre-check key: declared name plus byte length.
    ///
    /// Claimed before hashing so two workers never race to upload the
    /// literal same file selected twice.
    #[must_use]
    pub fn claim_key(&self) -> String {
        format!("{}:{}", self.filename, self.size)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_key_combines_name_and_size() {
        let task = UploadTask::new(
            FileSource::Memory(Bytes::from_static(b"abc")),
            "cat.png".to_string(),
            3,
            "image/png".to_string(),
        );
        assert_eq!(task.claim_key(), "cat.png:3");
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Done.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::Queued.is_terminal());
        assert!(!TaskState::Uploading.is_terminal());
    }

    #[tokio::test]
    async fn test_memory_source_digest_matches_hasher() {
        let hasher = ContentHasher::new();
        let source = FileSource::Memory(Bytes::from_static(b"payload"));
        assert_eq!(
            source.digest(&hasher).await.unwrap(),
            hasher.hash_bytes(b"payload")
        );
    }
}
