//! Batch upload queue with bounded worker concurrency.
//!
//! All shared state lives in the batch context: the pending deque, the
//! name+size claim set, the in-flight digest set and the progress counter.
//! Workers run as real tokio tasks, so every check-then-insert on the lock
//! sets goes through a mutex; none of the cooperative single-thread
//! assumptions of a browser event loop are relied on here.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use relaypix_common::ContentHasher;
use relaypix_core::{CompressionPolicy, compress_image};

use crate::task::{TaskState, UploadTask};
use crate::transport::{Transport, UploadPayload};

/// Hard bounds on worker concurrency.
const MIN_CONCURRENCY: usize = 1;
const MAX_CONCURRENCY: usize = 5;

/// Callback invoked with the batch progress percentage (0-100).
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Options for one batch run.
#[derive(Clone)]
pub struct BatchOptions {
    /// Number of concurrent workers (clamped to 1-5).
    pub max_concurrency: usize,
    /// Payloads above this many bytes are compressed before upload.
    pub size_ceiling: usize,
    /// Bounds for the compression loop.
    pub compression: CompressionPolicy,
    /// Invoked after each task reaches a terminal state with
    /// `completed / total * 100`; monotonically non-decreasing and exactly
    /// 100 once every task is terminal.
    pub on_progress: Option<ProgressFn>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            size_ceiling: 10 * 1024 * 1024,
            compression: CompressionPolicy::default(),
            on_progress: None,
        }
    }
}

/// Final accounting for one batch run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Number of tasks enqueued.
    pub total: usize,
    /// Tasks that reached `Done` (uploaded or resolved as duplicates).
    pub done: usize,
    /// Indices of tasks that reached `Failed`.
    pub failed: Vec<usize>,
}

struct BatchShared {
    tasks: Vec<Mutex<UploadTask>>,
    total: usize,
    pending: Mutex<VecDeque<usize>>,
    claims: Mutex<HashSet<String>>,
    inflight_digests: Mutex<HashSet<String>>,
    // Mutex rather than an atomic: the count and its progress report must
    // be one unit, or two workers could report out of order.
    completed: Mutex<usize>,
    options: BatchOptions,
    hasher: ContentHasher,
}

/// A batch of upload tasks.
///
/// Each batch owns its lock sets and progress counter, so independent
/// batches never interfere.
pub struct UploadBatch {
    tasks: Vec<UploadTask>,
    removed: HashSet<usize>,
    options: BatchOptions,
}

impl UploadBatch {
    /// Create an empty batch.
    #[must_use]
    pub fn new(options: BatchOptions) -> Self {
        Self {
            tasks: Vec::new(),
            removed: HashSet::new(),
            options,
        }
    }

    /// Add a task, returning its index within the batch.
    pub fn add_task(&mut self, task: UploadTask) -> usize {
        self.tasks.push(task);
        self.tasks.len() - 1
    }

    /// Remove a not-yet-started task so no worker picks it up.
    ///
    /// Only effective before [`run`](Self::run); an in-flight worker is
    /// never interrupted.
    pub fn remove_task(&mut self, index: usize) -> bool {
        if index < self.tasks.len() {
            self.removed.insert(index)
        } else {
            false
        }
    }

    /// Drain the batch with at most `max_concurrency` concurrent workers.
    ///
    /// Terminates once every task is in a terminal state; a failed task
    /// still counts toward completion so the batch always finishes.
    pub async fn run(self, transport: Arc<dyn Transport>) -> BatchReport {
        let pending: VecDeque<usize> = (0..self.tasks.len())
            .filter(|i| !self.removed.contains(i))
            .collect();
        let total = pending.len();

        let workers = self
            .options
            .max_concurrency
            .clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
            .min(total.max(1));

        let shared = Arc::new(BatchShared {
            tasks: self.tasks.into_iter().map(Mutex::new).collect(),
            total,
            pending: Mutex::new(pending),
            claims: Mutex::new(HashSet::new()),
            inflight_digests: Mutex::new(HashSet::new()),
            completed: Mutex::new(0),
            options: self.options,
            hasher: ContentHasher::new(),
        });

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let shared = Arc::clone(&shared);
            let transport = Arc::clone(&transport);
            handles.push(tokio::spawn(async move {
                worker_loop(&shared, transport.as_ref()).await;
            }));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Upload worker panicked");
            }
        }

        shared.report()
    }
}

impl BatchShared {
    fn set_state(&self, index: usize, state: TaskState) {
        if let Ok(mut task) = self.tasks[index].lock() {
            task.state = state;
        }
    }

    fn fail(&self, index: usize, error: &str) {
        if let Ok(mut task) = self.tasks[index].lock() {
            task.state = TaskState::Failed;
            task.error = Some(error.to_string());
        }
        tracing::warn!(index, error, "Upload task failed");
    }

    /// Bump the completion counter once a task reaches a terminal state.
    fn bump_completed(&self) {
        let Ok(mut completed) = self.completed.lock() else {
            return;
        };
        *completed += 1;
        let percent = ((*completed * 100) / self.total.max(1)) as u8;
        tracing::debug!(
            progress = percent,
            done = *completed,
            total = self.total,
            "Batch progress"
        );
        if let Some(ref on_progress) = self.options.on_progress {
            on_progress(percent);
        }
    }

    fn release_claim(&self, key: &str) {
        if let Ok(mut claims) = self.claims.lock() {
            claims.remove(key);
        }
    }

    fn report(&self) -> BatchReport {
        let mut done = 0;
        let mut failed = Vec::new();
        for (i, slot) in self.tasks.iter().enumerate() {
            if let Ok(task) = slot.lock() {
                match task.state {
                    TaskState::Done => done += 1,
                    TaskState::Failed => failed.push(i),
                    _ => {}
                }
            }
        }
        BatchReport {
            total: self.total,
            done,
            failed,
        }
    }
}

async fn worker_loop(shared: &BatchShared, transport: &dyn Transport) {
    loop {
        let index = match shared.pending.lock() {
            Ok(mut pending) => pending.pop_front(),
            Err(_) => None,
        };
        let Some(index) = index else {
            break;
        };
        process_task(shared, transport, index).await;
    }
}

async fn process_task(shared: &BatchShared, transport: &dyn Transport, index: usize) {
    let (source, claim_key, filename, content_type, tags, folder, expire) = {
        #[allow(clippy::unwrap_used)] // a poisoned task slot means a worker already panicked
        let task = shared.tasks[index].lock().unwrap();
        (
            task.source.clone(),
            task.claim_key(),
            task.filename.clone(),
            task.content_type.clone(),
            task.tags.clone(),
            task.folder.clone(),
            task.expire.clone(),
        )
    };

    // Cheap pre-check: if another in-flight worker already claimed this
    // name+size pair, the literal same file was selected twice. Skip
    // without touching the network.
    let claimed = match shared.claims.lock() {
        Ok(mut claims) => claims.insert(claim_key.clone()),
        Err(_) => false,
    };
    if !claimed {
        shared.set_state(index, TaskState::Done);
        shared.bump_completed();
        return;
    }

    // Hash before anything else; no transition skips this state.
    shared.set_state(index, TaskState::Hashing);
    let digest = match source.digest(&shared.hasher).await {
        Ok(digest) => digest,
        Err(e) => {
            shared.fail(index, &e.to_string());
            shared.release_claim(&claim_key);
            shared.bump_completed();
            return;
        }
    };

    // Content already handled in this batch: resolve as a duplicate of a
    // sibling, no network call.
    let fresh = match shared.inflight_digests.lock() {
        Ok(mut digests) => digests.insert(digest.clone()),
        Err(_) => false,
    };
    if !fresh {
        shared.set_state(index, TaskState::Done);
        shared.release_claim(&claim_key);
        shared.bump_completed();
        return;
    }

    let outcome = upload_payload(
        shared,
        transport,
        index,
        UploadPayload {
            data: Vec::new(),
            filename,
            content_type,
            tags,
            folder,
            expire,
            digest: digest.clone(),
        },
        &source,
    )
    .await;

    if outcome.is_err() {
        // Release the digest so identical content queued later in this
        // batch may still attempt its own upload.
        if let Ok(mut digests) = shared.inflight_digests.lock() {
            digests.remove(&digest);
        }
    }
    shared.release_claim(&claim_key);
    shared.bump_completed();
}

/// Load, conditionally compress, and upload one payload.
async fn upload_payload(
    shared: &BatchShared,
    transport: &dyn Transport,
    index: usize,
    mut payload: UploadPayload,
    source: &crate::task::FileSource,
) -> Result<(), ()> {
    let data = match source.read_all().await {
        Ok(data) => data,
        Err(e) => {
            shared.fail(index, &e.to_string());
            return Err(());
        }
    };

    payload.data = if data.len() > shared.options.size_ceiling {
        shared.set_state(index, TaskState::Compressing);
        let policy = shared.options.compression.clone();
        let compressed =
            tokio::task::spawn_blocking(move || compress_image(&data, &policy)).await;

        match compressed {
            Ok(Ok(compressed)) => {
                if compressed.len() > shared.options.size_ceiling {
                    shared.fail(index, "still oversized after compression");
                    return Err(());
                }
                compressed
            }
            Ok(Err(e)) => {
                shared.fail(index, &e.to_string());
                return Err(());
            }
            Err(e) => {
                shared.fail(index, &format!("compression task failed: {e}"));
                return Err(());
            }
        }
    } else {
        data
    };

    shared.set_state(index, TaskState::Uploading);
    match transport.send(&payload).await {
        Ok(receipt) => {
            shared.set_state(index, TaskState::Done);
            tracing::debug!(
                index,
                short_code = receipt.short_code.as_deref().unwrap_or(""),
                "Upload finished"
            );
            Ok(())
        }
        Err(e) => {
            shared.fail(index, &e.to_string());
            Err(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::task::FileSource;

    fn task(name: &str, data: &[u8]) -> UploadTask {
        UploadTask::new(
            FileSource::Memory(Bytes::copy_from_slice(data)),
            name.to_string(),
            data.len() as u64,
            "image/png".to_string(),
        )
    }

    #[test]
    fn test_concurrency_is_clamped() {
        let options = BatchOptions {
            max_concurrency: 99,
            ..Default::default()
        };
        assert_eq!(
            options
                .max_concurrency
                .clamp(MIN_CONCURRENCY, MAX_CONCURRENCY),
            5
        );

        let options = BatchOptions {
            max_concurrency: 0,
            ..Default::default()
        };
        assert_eq!(
            options
                .max_concurrency
                .clamp(MIN_CONCURRENCY, MAX_CONCURRENCY),
            1
        );
    }

    #[test]
    fn test_removed_task_is_not_scheduled() {
        let mut batch = UploadBatch::new(BatchOptions::default());
        batch.add_task(task("a.png", b"aa"));
        let idx = batch.add_task(task("b.png", b"bb"));
        assert!(batch.remove_task(idx));

        let pending: VecDeque<usize> = (0..batch.tasks.len())
            .filter(|i| !batch.removed.contains(i))
            .collect();
        assert_eq!(pending, VecDeque::from(vec![0]));
    }

    #[test]
    fn test_remove_task_out_of_range() {
        let mut batch = UploadBatch::new(BatchOptions::default());
        assert!(!batch.remove_task(3));
    }
}
