//! Database entities.

#![allow(missing_docs)]

pub mod access_log;
pub mod image;

pub use access_log::Entity as AccessLog;
pub use image::Entity as Image;
