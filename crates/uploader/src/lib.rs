//! Client-side concurrent upload pipeline.
//!
//! A batch of files moves through `queued → hashing → (compressing) →
//! uploading → done | failed` under bounded worker concurrency, with
//! content-addressed deduplication inside the batch: identical content is
//! uploaded at most once, siblings resolve without a network call.
//!
//! The batch is a self-contained context object; several batches can run
//! side by side without sharing any state.

pub mod queue;
pub mod task;
pub mod transport;

pub use queue::{BatchOptions, BatchReport, ProgressFn, UploadBatch};
pub use task::{FileSource, TaskState, UploadTask};
pub use transport::{HttpTransport, Transport, UploadPayload, UploadReceipt};
