//! Error types for the bundle tier.

/// Errors that can occur when working with the object-storage tier.
#[derive(Debug, thiserror::Error)]
pub enum TierError {
    /// Object storage error
    #[error("object storage error: {0}")]
    Backend(#[from] object_store::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No bundle stored under the given root id
    #[error("bundle not found: {0}")]
    NotFound(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// S3 bucket not found - must be created before use
    #[error("S3 bucket '{0}' does not exist. Create it before starting the service.")]
    BucketNotFound(String),
}

/// Result type alias for tier operations.
pub type Result<T> = std::result::Result<T, TierError>;
