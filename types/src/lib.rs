//! Fundamental types for the Sehat claims chain.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! hashes, timestamps, transactions, blocks, domain assets, and validator identities.

pub mod block;
pub mod error;
pub mod hash;
pub mod state;
pub mod time;
pub mod transaction;
pub mod validator;

pub use block::{Block, BlockHeader, QuorumCertificate, GENESIS_PROPOSER};
pub use error::TxError;
pub use hash::Hash32;
pub use state::{ClaimAsset, ClaimStatus, ReferralAsset, ReferralStatus, Visit};
pub use time::Timestamp;
pub use transaction::{
    ExecuteClaimPayload, ReferralPayload, SubmitClaimPayload, Transaction, TxKind, TxPayload,
    VisitPayload,
};
pub use validator::ValidatorConfig;
