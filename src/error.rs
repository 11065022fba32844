//! Error handling module for cubecomp
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Library code returns these; the binary wraps them in `anyhow` at the edge.

use thiserror::Error;

/// Main error type for cubecomp
#[derive(Error, Debug)]
pub enum CubeCompError {
    /// IO errors (state file, config file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite errors from the competition store or the file queue
    #[error("Database error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// Transport-level HTTP failures talking to Reddit
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Redis errors from the networked queue backend
    #[cfg(feature = "redis-queue")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A random pick was requested from an empty algorithm list
    #[error("No algorithms known for COLL case {case}")]
    EmptySelection { case: String },

    /// COLL case key not present in the table
    #[error("Unknown COLL case: {0}")]
    UnknownCase(String),

    /// Event name that does not map to a known event
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// Malformed user input (solve times, comment lines)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Schema migration failures
    #[error("Migration error: {0}")]
    Migration(String),

    /// Reddit API returned a non-success response
    #[error("Reddit API error: {0}")]
    Reddit(String),

    /// Task queue errors (unknown job payloads, backend misuse)
    #[error("Queue error: {0}")]
    Queue(String),

    /// Configuration errors (loading, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cycle state errors (missing post id, empty rotation pool)
    #[error("State error: {0}")]
    State(String),
}

/// Result type alias for cubecomp operations
pub type Result<T> = std::result::Result<T, CubeCompError>;

// Convenient error constructors
impl CubeCompError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a migration error
    pub fn migration(msg: impl Into<String>) -> Self {
        Self::Migration(msg.into())
    }

    /// Create a Reddit API error
    pub fn reddit(msg: impl Into<String>) -> Self {
        Self::Reddit(msg.into())
    }

    /// Create a queue error
    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CubeCompError::EmptySelection {
            case: "B1".to_string(),
        };
        assert_eq!(err.to_string(), "No algorithms known for COLL case B1");

        let err = CubeCompError::parse("bad time '1:xx'");
        assert_eq!(err.to_string(), "Parse error: bad time '1:xx'");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CubeCompError = io_err.into();
        assert!(matches!(err, CubeCompError::Io(_)));
    }

    #[test]
    fn test_error_constructors() {
        assert!(matches!(
            CubeCompError::reddit("403 Forbidden"),
            CubeCompError::Reddit(_)
        ));
        assert!(matches!(CubeCompError::queue("empty"), CubeCompError::Queue(_)));
        assert!(matches!(CubeCompError::state("no post"), CubeCompError::State(_)));
    }
}
