use thiserror::Error;

/// Errors raised while extracting, chunking, embedding, or searching.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("no text could be recovered from this file")]
    NoText,

    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("chunking error: {0}")]
    Chunking(String),

    #[error("embedding transport error: {0}")]
    Transport(String),

    #[error("embedding provider returned HTTP {0}")]
    HttpStatus(u16),

    #[error("failed to decode embedding response: {0}")]
    Decode(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("unauthorized: check the configured API key")]
    Unauthorized,

    #[error("rate limited by embedding provider")]
    RateLimited,

    #[error("embedding dimension mismatch: expected {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("core error: {0}")]
    Core(#[from] nook_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RagError {
    /// Transient failures the Indexer's retry policy applies to (spec.md
    /// §4.4): transport errors and rate limiting, nothing else.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::Transport(_) | RagError::RateLimited)
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
