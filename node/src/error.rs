use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] sehat_ledger::LedgerError),

    #[error("network error: {0}")]
    Network(#[from] sehat_network::NetworkError),

    #[error("consensus error: {0}")]
    Consensus(#[from] sehat_consensus::ConsensusError),

    #[error("protocol error: {0}")]
    Protocol(#[from] sehat_protocol::ProtocolError),

    #[error("malformed transaction: {0}")]
    Transaction(#[from] sehat_types::TxError),

    #[error("handshake with {peer} failed: {reason}")]
    Handshake { peer: String, reason: String },

    #[error("sync stalled at height {height}, network reports {target}")]
    SyncStalled { height: u64, target: u64 },

    #[error("config error: {0}")]
    Config(String),

    #[error("node is shutting down")]
    ShuttingDown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
