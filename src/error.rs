use std::string::FromUtf8Error;
use thiserror::Error;

/// Error type shared by every codec in this crate.
#[derive(Error, Debug)]
pub enum TagError {
    #[error("no tag found")]
    NoTag,
    #[error("malformed input: {0}")]
    Malformed(String),
    #[error(transparent)]
    InvalidUtf8(#[from] FromUtf8Error),
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
