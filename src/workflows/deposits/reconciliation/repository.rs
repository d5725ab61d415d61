use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    BankTransaction, CandidateRef, CompositeKey, PaymentMatchedNotice, Registrant, RegistrantId,
    VerificationResult, VerificationStatus,
};

/// Storage abstraction so the runner can be exercised in isolation and the
/// production ledger can live wherever the deployment keeps its data.
///
/// `commit_match` is the load-bearing operation: implementations must apply
/// the registrant's `pending -> paid` transition and insert the processed
/// composite key as a single atomic unit, with a unique constraint on the
/// key. A second attempt for the same key must fail with
/// [`RepositoryError::Conflict`] and leave all state untouched.
pub trait ReconciliationRepository: Send + Sync {
    /// Current registrant snapshot for the event being reconciled.
    fn registrant_pool(&self) -> Result<Vec<Registrant>, RepositoryError>;

    /// Read-side idempotency check; cheap, may race with `commit_match`
    /// (the unique constraint is the authority, this is the fast path).
    fn is_processed(&self, key: &CompositeKey) -> Result<bool, RepositoryError>;

    /// Atomically mark the registrant paid and record the processed key.
    fn commit_match(&self, commit: &MatchCommit) -> Result<(), RepositoryError>;

    /// Persist an `Ambiguous`/`NoMatch` result for the manual follow-up
    /// surface. Replaces any previous entry for the same key, so a later
    /// re-submission can supersede an earlier verdict.
    fn record_review(&self, result: &VerificationResult) -> Result<(), RepositoryError>;

    /// Items awaiting manual follow-up, oldest first.
    fn review_queue(&self, limit: usize) -> Result<Vec<ReviewItem>, RepositoryError>;
}

/// Everything `commit_match` writes in its single atomic unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCommit {
    pub composite_key: CompositeKey,
    pub registrant_id: RegistrantId,
    pub message: String,
    pub matched_at: DateTime<Utc>,
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("composite key already recorded")]
    Conflict,
    #[error("registrant not found or no longer pending")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// One persisted entry of the manual follow-up queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub transaction: BankTransaction,
    pub status: VerificationStatus,
    pub candidates: Vec<CandidateRef>,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

/// Outbound hook fired after a match commits, feeding the external
/// notification flows (SMS/e-mail delivery is not this engine's concern).
pub trait PaymentNotifier: Send + Sync {
    fn publish(&self, notice: PaymentMatchedNotice) -> Result<(), NotifyError>;
}

/// Notification dispatch error. Never rolls a committed match back.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Notifier that only logs; the default when no delivery integration is
/// wired in (server bootstrap, CLI runs).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl PaymentNotifier for LogNotifier {
    fn publish(&self, notice: PaymentMatchedNotice) -> Result<(), NotifyError> {
        tracing::info!(
            key = %notice.composite_key,
            registrant = %notice.registrant_id,
            amount = notice.amount,
            "payment matched notice emitted"
        );
        Ok(())
    }
}
