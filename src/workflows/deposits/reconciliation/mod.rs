//! Deposit reconciliation: decide which bank deposit pays for which
//! registrant without double-charging, misattributing money, or processing
//! the same ledger line twice.
//!
//! The matcher itself is pure; all side effects (the single allowed
//! `pending -> paid` transition plus the processed-key ledger write) go
//! through the repository trait so redelivery and overlapping polls stay
//! idempotent.

pub mod domain;
pub mod matching;
pub(crate) mod normalize;
pub mod repository;
pub mod router;
pub mod service;
pub mod storage;

#[cfg(test)]
mod tests;

pub use domain::{
    BankTransaction, CandidateRef, CompositeKey, LifecycleStatus, PaymentMatchedNotice,
    PaymentStatus, Registrant, RegistrantId, TransactionDirection, VerificationResult,
    VerificationStatus,
};
pub use matching::{MatchEngine, MatchOutcome, MatchPolicy};
pub use repository::{
    LogNotifier, MatchCommit, NotifyError, PaymentNotifier, ReconciliationRepository,
    RepositoryError, ReviewItem,
};
pub use router::{reconciliation_router, ReconciliationRequest, RunSummary};
pub use service::{DepositReconciliationService, ReconciliationServiceError};
pub use storage::SqliteLedger;
