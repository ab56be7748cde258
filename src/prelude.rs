pub use crate::error::TagError;
pub use crate::tag::{Cover, Tag};

pub type Result<T> = std::result::Result<T, TagError>;
