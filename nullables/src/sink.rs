//! Nullable claim status sink: remembers every notification.

use std::sync::{Mutex, PoisonError};

use sehat_state::{ClaimStatusSink, SinkError};
use sehat_types::ClaimStatus;

/// A sink that records calls in order. A failing sink still records, then
/// reports the call as failed.
#[derive(Debug, Default)]
pub struct NullSink {
    calls: Mutex<Vec<(String, ClaimStatus)>>,
    fail: bool,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Every notification so far, oldest first.
    pub fn notifications(&self) -> Vec<(String, ClaimStatus)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Statuses reported for one claim, oldest first.
    pub fn statuses_for(&self, claim_id: &str) -> Vec<ClaimStatus> {
        self.notifications()
            .into_iter()
            .filter(|(id, _)| id == claim_id)
            .map(|(_, status)| status)
            .collect()
    }
}

impl ClaimStatusSink for NullSink {
    fn notify_claim_status(&self, claim_id: &str, status: ClaimStatus) -> Result<(), SinkError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((claim_id.to_string(), status));
        if self.fail {
            Err(SinkError("null sink set to fail".into()))
        } else {
            Ok(())
        }
    }
}
