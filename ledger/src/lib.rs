//! Append-only block ledger.
//!
//! Blocks are stored in height order starting from a fixed genesis block.
//! Every append is checked against the current tail: the new block must be
//! exactly one higher and must link to the tail's header hash.

pub mod error;
pub mod genesis;
pub mod ledger;

pub use error::LedgerError;
pub use genesis::{genesis_block, genesis_hash, GENESIS_TIMESTAMP};
pub use ledger::Ledger;
