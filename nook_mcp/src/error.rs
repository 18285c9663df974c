use thiserror::Error;

/// Transport/protocol-level errors — distinct from a tool call failing,
/// which is reported in-band as `isError:true` rather than raised here.
#[derive(Error, Debug)]
pub enum McpError {
    #[error("malformed JSON-RPC request: {0}")]
    MalformedRequest(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, McpError>;
