use thiserror::Error;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Terminal initialization or rendering errors.
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Invalid path provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A listing call for a tree node was rejected.
    #[error("Could not list {node}: {message}")]
    Fetch { node: String, message: String },

    /// A listing or search call did not resolve in time.
    #[error("{operation} timed out after {millis} ms")]
    Timeout { operation: String, millis: u64 },

    /// A search provider failed while answering a query.
    #[error("Search provider '{provider}' failed: {message}")]
    SearchProvider { provider: String, message: String },

    /// The expanded-node set could not be written.
    #[error("Could not save expansion state: {0}")]
    Persistence(String),

    /// A data source refused the request.
    #[error("Source error: {0}")]
    Source(String),

    /// Malformed JSON in a catalog or state file.
    #[error("Malformed data: {0}")]
    Json(#[from] serde_json::Error),
}
