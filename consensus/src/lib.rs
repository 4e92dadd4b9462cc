//! Consensus for a permissioned validator set.
//!
//! Leadership rotates over the sorted validator ids by height. The leader
//! assembles, certifies, commits, and broadcasts a block in one step;
//! followers validate what they receive and commit it through the same
//! path. There is no voting round: the certificate carries the proposer's
//! signature only, produced behind the [`Certifier`] seam.

pub mod certificate;
pub mod error;
pub mod host;
pub mod round_robin;
pub mod validator_set;

pub use certificate::{Certifier, LeaderCertifier};
pub use error::ConsensusError;
pub use host::{ChainTip, ConsensusHost};
pub use round_robin::RoundRobin;
pub use validator_set::ValidatorSet;
