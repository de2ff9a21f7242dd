//! Core error types.

use thiserror::Error;

/// Fetch phase errors.
///
/// None of these are retried internally; every variant propagates to the
/// caller, which owns retry and backoff policy.
#[derive(Debug, Error)]
pub enum Error {
    /// A requested stored field resolves to an object path.
    #[error("field [{field}] isn't a leaf field")]
    FieldResolution { field: String },

    /// The primary index failed to read a document's stored fields.
    #[error("failed to fetch doc id [{doc_id}]")]
    StoredRead {
        doc_id: u32,
        #[source]
        source: std::io::Error,
    },

    /// The row store lookup for a document failed.
    #[error("failed to fetch doc id [{id}] from the row store")]
    Augmentation {
        id: String,
        #[source]
        source: Box<Error>,
    },

    /// Nested source or layout does not match the mapping.
    #[error("structural consistency violation: {0}")]
    StructuralConsistency(String),

    /// The request was cancelled between documents.
    #[error("fetch cancelled")]
    Cancelled,

    /// Row store storage error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Source payload encoding error.
    #[error("protocol error: {0}")]
    Protocol(#[from] hitfetch_proto::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Invalid request or data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Whether this error means "no result" rather than a fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_augmentation_keeps_cause() {
        let err = Error::Augmentation {
            id: "42".into(),
            source: Box::new(Error::InvalidData("bad key".into())),
        };
        assert_eq!(err.to_string(), "failed to fetch doc id [42] from the row store");
        let cause = std::error::Error::source(&err).unwrap();
        assert_eq!(cause.to_string(), "invalid data: bad key");
    }

    #[test]
    fn test_cancellation_is_distinguishable() {
        assert!(Error::Cancelled.is_cancellation());
        assert!(!Error::StructuralConsistency("x".into()).is_cancellation());
    }
}
