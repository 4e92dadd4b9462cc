//! World state and the deterministic state machine that mutates it.
//!
//! Only the [`Executor`] writes to [`WorldState`], one committed block at a
//! time. Business-rule failures are recorded in domain state (for example a
//! REJECTED claim) rather than surfaced as errors, so every node applying
//! the same block reaches the same state root.

pub mod eligibility;
pub mod executor;
pub mod sink;
pub mod world_state;

pub use eligibility::{ClaimEligibility, EligibilityDecision, EligibilityError, TariffTable};
pub use executor::{Executor, RejectReason, TxOutcome, REFERRAL_VALIDITY_SECS};
pub use sink::{ClaimStatusSink, LoggingSink, SinkError};
pub use world_state::{Assets, WorldState};
