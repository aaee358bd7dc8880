//! Error types for the fetch service.

/// Top-level error type for the fetch service.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Persisted document could not be written or encoded.
    #[error("storage error: {0}")]
    Storage(String),

    /// The alarm facility refused or failed to schedule a wake-up.
    #[error("scheduling error: {0}")]
    Scheduling(String),

    /// Network request failed (timeout, refused connection, bad status).
    #[error("transport error: {0}")]
    Transport(String),

    /// Service configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, FetchError>;
