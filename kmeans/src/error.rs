use thiserror::Error;

/// Errors returned by k-means engine operations.
#[derive(Debug, Error)]
pub enum KMeansError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("insufficient outliers: {empty} empty clusters, donor has {available}")]
    InsufficientOutliers { empty: usize, available: usize },

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("router error: {0}")]
    Router(String),

    #[error("aborted: a peer worker failed")]
    Aborted,
}

/// Result type for k-means operations.
pub type Result<T> = std::result::Result<T, KMeansError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = KMeansError::DimensionMismatch {
            expected: 3,
            got: 2,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 3, got 2");

        let err = KMeansError::InsufficientOutliers {
            empty: 3,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "insufficient outliers: 3 empty clusters, donor has 2"
        );

        assert_eq!(KMeansError::Aborted.to_string(), "aborted: a peer worker failed");
    }
}
