mod classify;
mod config;
mod filter;

pub use config::MatchPolicy;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{BankTransaction, CandidateRef, Registrant, VerificationStatus};
use super::normalize::normalize_name;

/// Stateless matcher applying the policy windows to one transaction at a
/// time. Purely computational; the runner owns deduplication and side
/// effects.
pub struct MatchEngine {
    policy: MatchPolicy,
}

impl MatchEngine {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Evaluate one transaction against a registrant snapshot. Withdrawals
    /// and blank remarks short-circuit with no candidates; everything else
    /// runs the full eligibility filter before classification.
    pub fn evaluate(
        &self,
        tx: &BankTransaction,
        pool: &[Registrant],
        session_date: Option<DateTime<Utc>>,
    ) -> MatchOutcome {
        if !tx.is_deposit() {
            return MatchOutcome {
                status: VerificationStatus::NoMatch,
                candidates: Vec::new(),
                message: "withdrawal; only deposits are matched".to_string(),
            };
        }

        if normalize_name(&tx.remark).is_empty() {
            return MatchOutcome {
                status: VerificationStatus::NoMatch,
                candidates: Vec::new(),
                message: "blank remark; no name signal to match on".to_string(),
            };
        }

        let candidates = filter::eligible_candidates(tx, pool, session_date, &self.policy);
        let (status, candidates, message) = classify::classify(&candidates);

        MatchOutcome {
            status,
            candidates,
            message,
        }
    }
}

/// Pure matching verdict before any side effect is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub status: VerificationStatus,
    pub candidates: Vec<CandidateRef>,
    pub message: String,
}
