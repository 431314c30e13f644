//! Streaming content digests.
//!
//! The digest is the dedup key for the whole system: two blobs with the same
//! digest are treated as identical content regardless of filename. It is an
//! equality fingerprint, not a cryptographic integrity guarantee.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{AppError, AppResult};

/// Chunk size for incremental hashing (2 MiB).
pub const HASH_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// A fixed-length content digest (lowercase hex).
pub type ContentDigest = String;

/// Computes content digests by streaming input through an incremental
/// accumulator, so blobs never have to be materialized in one buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher {
    _private: (),
}

impl ContentHasher {
    /// Create a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Hash an in-memory blob.
    ///
    /// Feeds the same fixed-size chunks into the accumulator as the
    /// streaming path, so both entry points agree on every input.
    #[must_use]
    pub fn hash_bytes(&self, data: &[u8]) -> ContentDigest {
        let mut ctx = md5::Context::new();
        for chunk in data.chunks(HASH_CHUNK_SIZE) {
            ctx.consume(chunk);
        }
        format!("{:x}", ctx.compute())
    }

    /// Hash a blob read sequentially from `reader`.
    ///
    /// A read error aborts the whole computation; the caller must treat the
    /// operation as failed rather than retry the hash silently.
    pub async fn hash_reader<R>(&self, mut reader: R) -> AppResult<ContentDigest>
    where
        R: AsyncRead + Unpin,
    {
        let mut ctx = md5::Context::new();
        let mut buf = vec![0u8; HASH_CHUNK_SIZE];

        loop {
            let n = reader
                .read(&mut buf)
                .await
                .map_err(|e| AppError::Hashing(format!("chunk read failed: {e}")))?;
            if n == 0 {
                break;
            }
            ctx.consume(&buf[..n]);
        }

        Ok(format!("{:x}", ctx.compute()))
    }
}
