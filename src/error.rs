use thiserror::Error;

/// Main error type for filerag
#[derive(Error, Debug)]
pub enum FileragError {
    /// Database-related errors (retrievable index storage)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Registry snapshot (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding API errors
    #[error("Embedding API error: {0}")]
    Embedding(String),

    /// Generator (chat completion) errors
    #[error("Generation error: {0}")]
    Generation(String),

    /// Retrievable index errors
    #[error("Index error: {0}")]
    Index(String),

    /// Document parsing / loading errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Registry record not found
    #[error("File ID not found: {0}")]
    DocumentNotFound(String),

    /// A path handed to the loader does not exist
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Only PDF and text documents are accepted
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An external call did not finish within its bound
    #[error("Timed out after {secs}s while {operation}")]
    Timeout { operation: String, secs: u64 },
}

impl FileragError {
    /// Whether retrying the same operation may succeed without user changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FileragError::Timeout { .. }
                | FileragError::Index(_)
                | FileragError::Embedding(_)
                | FileragError::Generation(_)
        )
    }
}

/// Convenient Result type using FileragError
pub type Result<T> = std::result::Result<T, FileragError>;

/// Run `fut` with an upper bound, mapping expiry to [`FileragError::Timeout`].
pub async fn with_timeout<T, F>(secs: u64, operation: &str, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(std::time::Duration::from_secs(secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(FileragError::Timeout {
            operation: operation.to_string(),
            secs,
        }),
    }
}
