//! Error types for the where-its-at service layer.

/// Top-level error type for the service layer.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration file or environment override error.
    #[error("config error: {0}")]
    Config(String),

    /// A caller passed a request the service refuses to run.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Structural failure of the search core.
    #[error(transparent)]
    Search(#[from] wia_search::SearchError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Logging could not be initialised.
    #[error("logging error: {0}")]
    Logging(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AppError>;
