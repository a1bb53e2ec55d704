//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache entries, groups and stores.
///
/// Expiration is never an error: stale values surface as `None`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backing store refused an operation (quota, backend failure)
    #[error("Store error: {0}")]
    Store(String),

    /// File-backed store I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value or store file could not be serialized or parsed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A custom codec rejected the stored text
    #[error("Decode error: {0}")]
    Decode(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = CacheError::Store("quota exceeded".to_string());
        assert_eq!(err.to_string(), "Store error: quota exceeded");
    }

    #[test]
    fn test_serialization_error_from() {
        let parse_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: CacheError = parse_err.into();
        assert!(matches!(err, CacheError::Serialization(_)));
    }
}
