//! Domain assets held in world state, and their lifecycle enums.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fact of a clinical encounter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub record_id: String,
    pub record_hash: String,
}

/// Lifecycle of a referral.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferralStatus {
    /// Issued and not yet consumed.
    Active,
    /// Consumed by a claim.
    Used,
    /// Validity window has passed.
    Expired,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Used => "USED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A patient's authorized transfer between two facilities (rujukan).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralAsset {
    pub id: String,
    pub patient_id: String,
    pub origin_faskes_id: String,
    pub target_faskes_id: String,
    pub record_id: String,
    pub record_hash: String,
    pub status: ReferralStatus,
    pub issue_date: Timestamp,
    pub expiry_date: Timestamp,
}

/// Lifecycle of a reimbursement claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    /// Eligible and awaiting a payment decision.
    Pending,
    Rejected,
    Paid,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Rejected => "REJECTED",
            Self::Paid => "PAID",
        }
    }

    /// PAID and REJECTED never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Rejected)
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for reimbursement tied to a visit and, optionally, a referral.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimAsset {
    pub claim_id: String,
    pub referral_id: Option<String>,
    pub faskes_id: String,
    pub record_id: String,
    pub record_hash: String,
    pub diagnosis_code: String,
    pub amount: u64,
    pub status: ClaimStatus,
    pub timestamp: Timestamp,
}
