use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("cannot bind P2P port {port}: {reason}")]
    BindFailed { port: u16, reason: String },

    #[error("peer {0} not found")]
    PeerNotFound(String),

    #[error("request to {peer} timed out after {timeout_ms}ms")]
    RequestTimeout { peer: String, timeout_ms: u64 },

    #[error("connection to {0} is closed")]
    Closed(String),

    #[error("unexpected response from {peer}: {kind}")]
    UnexpectedResponse { peer: String, kind: String },

    #[error("protocol error: {0}")]
    Protocol(#[from] sehat_protocol::ProtocolError),

    #[error("IO error: {0}")]
    Io(String),
}
