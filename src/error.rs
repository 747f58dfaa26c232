use thiserror::Error;

/// Error type of every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum KMeansError {
    /// Rejected before any iteration ran: k out of range, empty dataset, unusable options.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Points (or points and centroids) with differing coordinate counts.
    #[error("dimension mismatch: expected {expected} coordinates, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("wire encoding failed: {0}")]
    Wire(#[from] bincode::Error),
    #[error("writing phase log failed: {0}")]
    Csv(#[from] csv::Error),
    /// A collective saw a contribution that does not belong to the same call on every rank.
    #[error("collective desynchronized: {0}")]
    Desynchronized(String),
}

/// Convenient alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, KMeansError>;

pub(crate) fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    let msg = msg.into();
    tracing::warn!(reason = %msg, "rejecting k-means configuration");
    Err(KMeansError::InvalidConfiguration(msg))
}
