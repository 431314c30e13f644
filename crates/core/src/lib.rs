//! Core business logic for relaypix.

pub mod services;

pub use services::*;
