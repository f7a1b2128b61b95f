//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Every variant is a local, recoverable condition. `get` and `delete` never
/// produce one: absence is reported as `None`, not as an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// `add` collided with a live entry
    #[error("Key already exists: {0}")]
    KeyExists(String),

    /// `replace` targeted a key with no live entry
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Construction-time configuration was rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Write attempted after the store was closed
    #[error("Cache store is closed")]
    StoreClosed,
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_key() {
        let err = CacheError::KeyExists("session:42".to_string());
        assert_eq!(err.to_string(), "Key already exists: session:42");

        let err = CacheError::KeyNotFound("session:42".to_string());
        assert_eq!(err.to_string(), "Key not found: session:42");
    }

    #[test]
    fn test_error_kinds_are_distinguishable() {
        let exists = CacheError::KeyExists("k".to_string());
        let missing = CacheError::KeyNotFound("k".to_string());

        assert!(matches!(exists, CacheError::KeyExists(_)));
        assert!(matches!(missing, CacheError::KeyNotFound(_)));
        assert_ne!(exists, missing);
    }
}
