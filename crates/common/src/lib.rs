//! Common utilities and shared types for relaypix.
//!
//! This crate provides foundational components used across all relaypix crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID entity ids and short codes via [`IdGenerator`]
//! - **Content hashing**: Streaming content digests via [`ContentHasher`]
//!
//! # Example
//!
//! ```no_run
//! use relaypix_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID: {}", id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod digest;
pub mod error;
pub mod id;

pub use config::Config;
pub use digest::{ContentDigest, ContentHasher, HASH_CHUNK_SIZE};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
