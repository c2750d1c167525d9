//! Attachment errors

use ca_core::{CaError, Id, ValidationErrors};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Attachment not found: {0}")]
    NotFound(Id),
    /// Broken caller invariant; never retried
    #[error("Logic error: {0}")]
    Logic(String),
    #[error("Invalid attachment: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Handler for {content_type} failed: {message}")]
    Handler {
        content_type: String,
        message: String,
    },
}

pub type AttachmentResult<T> = Result<T, AttachmentError>;

impl From<AttachmentError> for CaError {
    fn from(err: AttachmentError) -> Self {
        match err {
            AttachmentError::NotFound(id) => CaError::NotFound {
                entity: "Attachment",
                field: "attachment_id",
                value: id.to_string(),
            },
            AttachmentError::Logic(message) => CaError::Logic(message),
            AttachmentError::Validation(errors) => CaError::Validation(errors),
            AttachmentError::Unsupported(message) => CaError::Unsupported(message),
            AttachmentError::Store(message) => CaError::Database(message),
            other @ AttachmentError::Handler { .. } => CaError::Internal(other.to_string()),
        }
    }
}
