use thiserror::Error;

/// Reasons a transaction is not well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    #[error("transaction field `{0}` is empty")]
    EmptyField(&'static str),

    #[error("invalid claim decision: {0}")]
    InvalidDecision(String),
}
