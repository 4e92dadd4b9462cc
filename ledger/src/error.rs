use sehat_types::Hash32;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("invalid height: expected {expected}, got {got}")]
    InvalidHeight { expected: u64, got: u64 },

    #[error("invalid linkage at height {height}: prev_hash {got} does not match tail {expected}")]
    InvalidLinkage {
        height: u64,
        expected: Hash32,
        got: Hash32,
    },

    #[error("height {height} not found (latest is {latest})")]
    HeightNotFound { height: u64, latest: u64 },
}
