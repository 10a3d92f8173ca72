// ==============================================================================
// RPC Errors
// ==============================================================================

/// Failures talking to the JSON-RPC node.
///
/// These are surfaced to callers unmodified: the resolution pipeline never
/// retries and never caches a failed request.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("RPC server error {code}: {message}")]
    ServerError { code: i64, message: String },

    #[error("invalid RPC response: {0}")]
    InvalidResponse(String),
}

// ==============================================================================
// Core Error
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("RPC communication failure: {0}")]
    Rpc(#[from] RpcError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid node response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
