//! Database repositories.

mod access_log;
mod image;

pub use access_log::AccessLogRepository;
pub use image::{ImageListFilter, ImageRepository};
