//! Error types for the memoizing cache
//!
//! The engine never fails a lookup or an invalidation on its own. Producer
//! failures stay in the caller's error type and are handed back untouched, so
//! the only error the crate originates is a bad invalidation pattern.

use thiserror::Error;

// == Cache Error Enum ==
/// Errors originated by the cache itself.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalidation pattern is not a valid regular expression
    #[error("Invalid key pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pattern_display() {
        let err: CacheError = regex::Regex::new("(unclosed").unwrap_err().into();
        assert!(err.to_string().starts_with("Invalid key pattern:"));
    }
}
