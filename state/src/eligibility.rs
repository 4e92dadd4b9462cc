//! Claim eligibility capability and the static tariff table.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EligibilityError {
    #[error("diagnosis code is empty")]
    EmptyCode,

    #[error("eligibility service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityDecision {
    pub eligible: bool,
    /// Reimbursable amount; zero when not eligible.
    pub amount: u64,
}

impl EligibilityDecision {
    pub fn eligible(amount: u64) -> Self {
        Self {
            eligible: true,
            amount,
        }
    }

    pub fn ineligible() -> Self {
        Self {
            eligible: false,
            amount: 0,
        }
    }
}

/// Looks up whether a diagnosis code is reimbursable, and for how much.
///
/// Called synchronously during block execution, so implementations must
/// answer identically on every node for the same code.
pub trait ClaimEligibility: Send + Sync {
    fn verify_claim(&self, diagnosis_code: &str) -> Result<EligibilityDecision, EligibilityError>;
}

/// Fixed INA-CBG style tariff lookup. Only codes in the `A` group are
/// covered.
#[derive(Debug, Clone)]
pub struct TariffTable {
    tariffs: HashMap<String, u64>,
}

const DEFAULT_TARIFFS: &[(&str, u64)] = &[
    ("A00", 500_000),
    ("A01", 750_000),
    ("A02", 600_000),
    ("A03", 550_000),
    ("A04", 450_000),
    ("A05", 350_000),
    ("A06", 800_000),
    ("A07", 700_000),
    ("A08", 400_000),
    ("A09", 300_000),
];

impl Default for TariffTable {
    fn default() -> Self {
        Self::with_entries(DEFAULT_TARIFFS.iter().map(|(code, amount)| (*code, *amount)))
    }
}

impl TariffTable {
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, u64)>) -> Self {
        Self {
            tariffs: entries
                .into_iter()
                .map(|(code, amount)| (code.to_string(), amount))
                .collect(),
        }
    }
}

impl ClaimEligibility for TariffTable {
    fn verify_claim(&self, diagnosis_code: &str) -> Result<EligibilityDecision, EligibilityError> {
        if diagnosis_code.is_empty() {
            return Err(EligibilityError::EmptyCode);
        }
        if !diagnosis_code.starts_with('A') {
            return Ok(EligibilityDecision::ineligible());
        }
        Ok(match self.tariffs.get(diagnosis_code) {
            Some(amount) => EligibilityDecision::eligible(*amount),
            None => EligibilityDecision::ineligible(),
        })
    }
}
