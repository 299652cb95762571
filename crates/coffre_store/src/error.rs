//! Error types and retryable/fatal classification.

use coffre_schema::Collection;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// How the transaction runner should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Lock or serialization conflict; the caller may re-run the whole
    /// transaction.
    Retryable,
    /// Anything else; the caller must not retry.
    Fatal,
}

/// Errors reported by storage providers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Row codec or crypto failure. Always fatal.
    #[error("codec error: {0}")]
    Codec(#[from] coffre_codec::CodecError),

    /// SQLite driver error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Optimistic-concurrency clash: a staged update carried a version
    /// older than the stored row.
    #[error("write contention on {collection}/{id}")]
    Contention {
        /// Collection where the clash occurred.
        collection: Collection,
        /// Storage id of the row.
        id: String,
    },

    /// Insert of a key that already exists.
    #[error("duplicate key {collection}/{id}")]
    DuplicateKey {
        /// Collection of the duplicate.
        collection: Collection,
        /// Storage id of the row.
        id: String,
    },

    /// Update of a key that does not exist.
    #[error("missing row {collection}/{id}")]
    MissingRow {
        /// Collection searched.
        collection: Collection,
        /// Storage id of the row.
        id: String,
    },

    /// Operation not permitted in the provider's current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl StoreError {
    /// Creates an invalid-operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Classifies the error for the transaction runner.
    ///
    /// Only backend-reported lock/serialization conflicts are retryable.
    /// Crypto and codec failures indicate key misconfiguration or data
    /// corruption and are never retried.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            StoreError::Contention { .. } => ErrorClass::Retryable,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                ErrorClass::Retryable
            }
            _ => ErrorClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32) -> StoreError {
        StoreError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(code),
            Some("simulated".into()),
        ))
    }

    #[test]
    fn busy_and_locked_are_retryable() {
        assert_eq!(sqlite_failure(rusqlite::ffi::SQLITE_BUSY).class(), ErrorClass::Retryable);
        assert_eq!(sqlite_failure(rusqlite::ffi::SQLITE_LOCKED).class(), ErrorClass::Retryable);
    }

    #[test]
    fn constraint_violation_is_fatal() {
        assert_eq!(
            sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT).class(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn contention_is_retryable() {
        let e = StoreError::Contention {
            collection: Collection::Accounts,
            id: "815@A1".into(),
        };
        assert_eq!(e.class(), ErrorClass::Retryable);
    }

    #[test]
    fn codec_errors_are_fatal() {
        let e = StoreError::Codec(coffre_codec::CodecError::Decryption("bad key".into()));
        assert_eq!(e.class(), ErrorClass::Fatal);
    }

    #[test]
    fn duplicate_and_missing_are_fatal() {
        let dup = StoreError::DuplicateKey {
            collection: Collection::Notes,
            id: "x".into(),
        };
        let miss = StoreError::MissingRow {
            collection: Collection::Notes,
            id: "x".into(),
        };
        assert_eq!(dup.class(), ErrorClass::Fatal);
        assert_eq!(miss.class(), ErrorClass::Fatal);
    }
}
