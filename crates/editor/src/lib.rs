//! Single-document template editing over a pluggable backend.

use storage::StoreError;
use template::TemplateError;
use thiserror::Error;

mod backend;
pub use backend::*;
mod http;
pub use http::HttpBackend;
mod local;
pub use local::LocalBackend;
mod notice;
pub use notice::*;
mod session;
pub use session::*;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("no template is loaded")]
    NoTemplate,
    #[error("not allowed right now: {0}")]
    InvalidMode(&'static str),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Backend(#[from] StoreError),
}

impl EditorError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Backend(StoreError::NotFound(_)))
    }

    /// Input problems the user can correct and resubmit.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Template(e) => e.is_validation(),
            Self::Backend(e) => e.is_client_error(),
            _ => false,
        }
    }
}

pub type EditorResult<T> = Result<T, EditorError>;
