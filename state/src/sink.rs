//! Claim status notification capability.

use sehat_types::ClaimStatus;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("claim status sink failed: {0}")]
pub struct SinkError(pub String);

/// Receives claim status changes after they are applied. Fire-and-forget:
/// failures are logged by the executor and never retried.
pub trait ClaimStatusSink: Send + Sync {
    fn notify_claim_status(&self, claim_id: &str, status: ClaimStatus) -> Result<(), SinkError>;
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl ClaimStatusSink for LoggingSink {
    fn notify_claim_status(&self, claim_id: &str, status: ClaimStatus) -> Result<(), SinkError> {
        tracing::info!(claim = %claim_id, status = %status, "claim status changed");
        Ok(())
    }
}
