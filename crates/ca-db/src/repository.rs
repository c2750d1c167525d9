//! Repository errors

use ca_attachments::AttachmentError;
use ca_core::CaError;

/// Error type for repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<RepositoryError> for AttachmentError {
    fn from(err: RepositoryError) -> Self {
        AttachmentError::Store(err.to_string())
    }
}

impl From<RepositoryError> for CaError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) => CaError::Database(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_attachment_error() {
        let err: AttachmentError = RepositoryError::Database(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, AttachmentError::Store(_)));

        let err: CaError = RepositoryError::Database(sqlx::Error::PoolClosed).into();
        assert_eq!(err.error_code(), "database_error");
    }
}
