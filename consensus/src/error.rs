use sehat_types::Hash32;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    #[error("height mismatch: expected {expected}, got {got}")]
    HeightMismatch { expected: u64, got: u64 },

    #[error("block {height} does not link to the local tip")]
    PrevHashMismatch { height: u64 },

    #[error("block {height} proposed by {got}, expected leader {expected}")]
    WrongProposer {
        height: u64,
        expected: String,
        got: String,
    },

    #[error("block {height} tx_root does not match its transactions")]
    TxRootMismatch { height: u64 },

    #[error("block {height} has a bad certificate: {reason}")]
    BadCertificate { height: u64, reason: String },

    #[error("state root divergence at height {height}: local {expected}, block {got}")]
    StateRootDivergence {
        height: u64,
        expected: Hash32,
        got: Hash32,
    },

    #[error("{0} is not a validator")]
    NotValidator(String),

    #[error("not the leader for height {height} (leader is {leader})")]
    NotLeader { height: u64, leader: String },

    #[error("no pending transactions to propose")]
    NothingToPropose,

    #[error("validator set is empty")]
    EmptyValidatorSet,

    #[error("block {height} is stale: the chain moved on")]
    Stale { height: u64 },

    #[error("commit failed: {0}")]
    Commit(String),
}

impl ConsensusError {
    /// A block this node already has, or one from a height already passed.
    pub fn is_stale(&self) -> bool {
        match self {
            Self::HeightMismatch { expected, got } => got < expected,
            Self::Stale { .. } => true,
            _ => false,
        }
    }
}
