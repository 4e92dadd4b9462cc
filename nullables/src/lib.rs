//! Nullable collaborators for deterministic testing.
//!
//! The node calls out to an eligibility service and a claim status sink.
//! Eligibility already has a deterministic stand-in (`TariffTable`); this
//! crate provides the sink side, which records instead of persisting.

pub mod sink;

pub use sink::NullSink;
