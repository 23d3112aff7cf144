//! Smart block engine errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SmartBlockError>;

#[derive(Error, Debug)]
pub enum SmartBlockError {
    /// Catalog or resolver failure, propagated unchanged
    #[error("Catalog error: {0}")]
    Catalog(#[from] grimnir_common::Error),

    /// Stored or submitted rule/sequence JSON could not be read
    #[error("Invalid rules: {0}")]
    InvalidRules(String),

    /// Form field failed validation
    #[error("Invalid form field '{field}': {reason}")]
    InvalidForm { field: String, reason: String },

    #[error("Smart block not found: {0}")]
    NotFound(String),

    /// A preview variant task failed to complete
    #[error("Variant generation failed: {0}")]
    Variant(String),
}

impl SmartBlockError {
    pub(crate) fn form(field: &str, reason: impl Into<String>) -> Self {
        SmartBlockError::InvalidForm {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
