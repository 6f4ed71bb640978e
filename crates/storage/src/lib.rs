//! Persistence for template documents and uploaded media.

use template::TemplateError;
use thiserror::Error;

mod filename;
pub use filename::*;
mod templates;
pub use templates::*;
mod media;
pub use media::*;
mod cloudinary;
pub use cloudinary::*;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid filename `{name}`: {reason}")]
    InvalidFilename { name: String, reason: &'static str },
    #[error("template `{0}` not found")]
    NotFound(String),
    #[error("template `{0}` already exists")]
    Conflict(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("{0}")]
    Validation(String),
    #[error("stored template `{name}` is unreadable: {source}")]
    Corrupt {
        name: String,
        #[source]
        source: TemplateError,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl StoreError {
    /// Errors the caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::InvalidFilename { .. } | Self::Validation(_) => true,
            Self::Template(e) => e.is_validation(),
            _ => false,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
