//! Error types for blob operations.

use thiserror::Error;

/// Result type for blob operations.
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors reported by blob stores.
#[derive(Debug, Error)]
pub enum BlobError {
    /// Key obfuscation failed.
    #[error("codec error: {0}")]
    Codec(#[from] coffre_codec::CodecError),

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The addressed file does not exist.
    #[error("blob not found: {org}/{id}/{file_id}")]
    NotFound {
        /// Plaintext organization code.
        org: String,
        /// Plaintext document id.
        id: String,
        /// Plaintext file id.
        file_id: String,
    },
}

impl BlobError {
    /// Creates a not-found error from plaintext components.
    pub fn not_found(org: &str, id: &str, file_id: &str) -> Self {
        Self::NotFound {
            org: org.to_owned(),
            id: id.to_owned(),
            file_id: file_id.to_owned(),
        }
    }
}
