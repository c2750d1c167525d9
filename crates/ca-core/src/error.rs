//! Core error types for content attachments

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Core error type shared by every crate in the workspace
#[derive(Error, Debug)]
pub enum CaError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Programmer error: an invariant the caller must uphold was broken
    #[error("Logic error: {0}")]
    Logic(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Standard Result type for attachment operations
pub type CaResult<T> = Result<T, CaError>;

/// Validation errors collection
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    /// Field-specific errors: field_name -> Vec<error_messages>
    pub errors: HashMap<String, Vec<String>>,
    /// Base errors not tied to a specific field
    pub base_errors: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn add_base(&mut self, message: impl Into<String>) {
        self.base_errors.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.base_errors.is_empty()
    }

    /// Check if there are errors for a specific field
    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    /// Get errors for a specific field
    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.errors.get(field)
    }

    /// Ok when empty, otherwise the collected errors
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn full_messages(&self) -> Vec<String> {
        let mut messages = self.base_errors.clone();
        let mut fields: Vec<_> = self.errors.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        for (field, field_messages) in fields {
            for msg in field_messages {
                messages.push(format!("{} {}", field, msg));
            }
        }
        messages
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation errors: {}", self.full_messages().join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

impl CaError {
    pub fn error_code(&self) -> &'static str {
        match self {
            CaError::NotFound { .. } => "not_found",
            CaError::Validation(_) => "validation_failed",
            CaError::Logic(_) => "logic_error",
            CaError::Unsupported(_) => "unsupported",
            CaError::Database(_) => "database_error",
            CaError::Config(_) => "configuration_error",
            CaError::Internal(_) => "internal_error",
        }
    }

    /// Whether the error reflects a bug in the caller rather than bad input
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaError::Logic(_) | CaError::Internal(_))
    }
}
