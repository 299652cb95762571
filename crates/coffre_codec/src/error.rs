//! Error types for codec operations.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding, decoding or encrypting rows.
///
/// Every variant is fatal to the surrounding operation: the transaction
/// runner never classifies a codec error as retryable.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Key material has the wrong length.
    #[error("invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        /// Expected size in bytes.
        expected: usize,
        /// Actual size in bytes.
        actual: usize,
    },

    /// Key derivation from a passphrase failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed (wrong key or corrupted data).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Payload serialization failed.
    #[error("payload encode failed: {0}")]
    Encode(String),

    /// Payload deserialization failed.
    #[error("payload decode failed: {0}")]
    Decode(String),

    /// A stored id does not have the expected long-id shape.
    #[error("malformed id: {0}")]
    MalformedId(String),

    /// A row belongs to a different tenant than this codec.
    #[error("tenant mismatch: row org {row_org:?} != codec org {codec_org:?}")]
    TenantMismatch {
        /// Organization decoded from the row.
        row_org: String,
        /// Organization this codec is keyed for.
        codec_org: String,
    },
}

impl CodecError {
    /// Creates an encryption error.
    pub fn encryption(message: impl Into<String>) -> Self {
        Self::Encryption(message.into())
    }

    /// Creates a decryption error.
    pub fn decryption(message: impl Into<String>) -> Self {
        Self::Decryption(message.into())
    }

    /// Creates a malformed-id error.
    pub fn malformed_id(message: impl Into<String>) -> Self {
        Self::MalformedId(message.into())
    }
}
