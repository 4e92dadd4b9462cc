//! Transactions and their typed payloads.
//!
//! A transaction's payload is a closed sum over the four kinds of event the
//! chain records. The `type` tag on the wire selects the payload shape, so a
//! payload that does not match its tag fails to decode.

use crate::{ClaimStatus, Timestamp, TxError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of [`TxPayload`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TxKind {
    RecordVisit,
    CreateReferral,
    SubmitClaim,
    ExecuteClaim,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RecordVisit => "RECORD_VISIT",
            Self::CreateReferral => "CREATE_REFERRAL",
            Self::SubmitClaim => "SUBMIT_CLAIM",
            Self::ExecuteClaim => "EXECUTE_CLAIM",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitPayload {
    pub record_id: String,
    pub record_hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralPayload {
    pub referral_id: String,
    pub patient_id: String,
    pub record_id: String,
    pub record_hash: String,
    pub origin_faskes_id: String,
    pub target_faskes_id: String,
    pub diagnosis_code: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitClaimPayload {
    pub claim_id: String,
    /// Claims without a referral skip the referral checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_id: Option<String>,
    pub record_id: String,
    pub record_hash: String,
    pub diagnosis_code: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteClaimPayload {
    pub claim_id: String,
    pub admin_id: String,
    pub decision: ClaimStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxPayload {
    RecordVisit(VisitPayload),
    CreateReferral(ReferralPayload),
    SubmitClaim(SubmitClaimPayload),
    ExecuteClaim(ExecuteClaimPayload),
}

impl TxPayload {
    pub fn kind(&self) -> TxKind {
        match self {
            Self::RecordVisit(_) => TxKind::RecordVisit,
            Self::CreateReferral(_) => TxKind::CreateReferral,
            Self::SubmitClaim(_) => TxKind::SubmitClaim,
            Self::ExecuteClaim(_) => TxKind::ExecuteClaim,
        }
    }

    fn check_well_formed(&self) -> Result<(), TxError> {
        match self {
            Self::RecordVisit(p) => {
                require("record_id", &p.record_id)?;
                require("record_hash", &p.record_hash)
            }
            Self::CreateReferral(p) => {
                require("referral_id", &p.referral_id)?;
                require("patient_id", &p.patient_id)?;
                require("record_id", &p.record_id)
            }
            Self::SubmitClaim(p) => {
                require("claim_id", &p.claim_id)?;
                require("record_id", &p.record_id)
            }
            Self::ExecuteClaim(p) => {
                require("claim_id", &p.claim_id)?;
                require("admin_id", &p.admin_id)?;
                if p.decision.is_terminal() {
                    Ok(())
                } else {
                    Err(TxError::InvalidDecision(p.decision.to_string()))
                }
            }
        }
    }
}

/// A signed event submitted to the chain. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Globally unique, generated by the submitter.
    pub id: String,
    pub timestamp: Timestamp,
    pub sender_id: String,
    pub signature: String,
    pub payload: TxPayload,
}

impl Transaction {
    pub fn kind(&self) -> TxKind {
        self.payload.kind()
    }

    /// Bytes covered by the transaction hash and signature:
    /// kind, timestamp, sender, then the canonical JSON of the payload.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(self.kind().as_str().as_bytes());
        buf.extend_from_slice(&self.timestamp.as_secs().to_be_bytes());
        buf.extend_from_slice(self.sender_id.as_bytes());
        // Serializing derived structs cannot fail; an empty payload would
        // still hash deterministically.
        buf.extend_from_slice(&serde_json::to_vec(&self.payload).unwrap_or_default());
        buf
    }

    /// Structural checks only. Business rules are applied at execution.
    pub fn check_well_formed(&self) -> Result<(), TxError> {
        require("id", &self.id)?;
        require("sender_id", &self.sender_id)?;
        require("signature", &self.signature)?;
        self.payload.check_well_formed()
    }
}

fn require(field: &'static str, value: &str) -> Result<(), TxError> {
    if value.trim().is_empty() {
        Err(TxError::EmptyField(field))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visit_tx() -> Transaction {
        Transaction {
            id: "tx-1".into(),
            timestamp: Timestamp::new(1_700_000_000),
            sender_id: "rs-1".into(),
            signature: "sig".into(),
            payload: TxPayload::RecordVisit(VisitPayload {
                record_id: "rm-1".into(),
                record_hash: "abc".into(),
            }),
        }
    }

    #[test]
    fn payload_is_tagged_by_type() {
        let json = serde_json::to_value(visit_tx()).unwrap();
        assert_eq!(json["payload"]["type"], "RECORD_VISIT");
        assert_eq!(json["payload"]["data"]["record_id"], "rm-1");
    }

    #[test]
    fn mismatched_payload_fails_to_decode() {
        let json = r#"{"id":"x","timestamp":1,"sender_id":"s","signature":"g",
            "payload":{"type":"EXECUTE_CLAIM","data":{"record_id":"r","record_hash":"h"}}}"#;
        assert!(serde_json::from_str::<Transaction>(json).is_err());
    }

    #[test]
    fn signing_bytes_cover_sender_and_payload() {
        let a = visit_tx();
        let mut b = visit_tx();
        b.sender_id = "rs-2".into();
        assert_ne!(a.signing_bytes(), b.signing_bytes());

        let mut c = visit_tx();
        c.id = "tx-other".into();
        assert_eq!(a.signing_bytes(), c.signing_bytes());
    }

    #[test]
    fn well_formedness() {
        assert!(visit_tx().check_well_formed().is_ok());

        let mut tx = visit_tx();
        tx.id = String::new();
        assert_eq!(tx.check_well_formed(), Err(TxError::EmptyField("id")));

        let mut tx = visit_tx();
        tx.payload = TxPayload::ExecuteClaim(ExecuteClaimPayload {
            claim_id: "c".into(),
            admin_id: "adm".into(),
            decision: ClaimStatus::Pending,
        });
        assert!(matches!(
            tx.check_well_formed(),
            Err(TxError::InvalidDecision(_))
        ));
    }
}
