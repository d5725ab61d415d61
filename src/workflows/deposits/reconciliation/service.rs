use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::domain::{
    BankTransaction, PaymentMatchedNotice, PaymentStatus, Registrant, VerificationResult,
    VerificationStatus,
};
use super::matching::{MatchEngine, MatchPolicy};
use super::repository::{
    MatchCommit, PaymentNotifier, ReconciliationRepository, RepositoryError, ReviewItem,
};

/// Batch orchestration: dedup -> filter -> classify -> apply, one result
/// per input transaction, in input order.
pub struct DepositReconciliationService<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
    engine: MatchEngine,
}

impl<R, N> DepositReconciliationService<R, N>
where
    R: ReconciliationRepository + 'static,
    N: PaymentNotifier + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>, policy: MatchPolicy) -> Self {
        Self {
            repository,
            notifier,
            engine: MatchEngine::new(policy),
        }
    }

    /// Reconcile one batch against the current registrant snapshot.
    ///
    /// Transactions are processed strictly sequentially: each commit is
    /// reflected in the in-memory snapshot before the next transaction is
    /// evaluated, so two lines in one batch can never both match the same
    /// registrant. Re-running a batch is safe; previously committed keys
    /// come back as `AlreadyProcessed`.
    pub fn run_batch(
        &self,
        transactions: &[BankTransaction],
        session_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<VerificationResult>, ReconciliationServiceError> {
        for tx in transactions {
            validate_transaction(tx)?;
        }

        let mut snapshot = self.repository.registrant_pool()?;
        let mut results = Vec::with_capacity(transactions.len());

        for tx in transactions {
            results.push(self.process_one(tx, &mut snapshot, session_date)?);
        }

        Ok(results)
    }

    /// Pending `Ambiguous`/`NoMatch` items for the admin follow-up surface.
    pub fn review_queue(&self, limit: usize) -> Result<Vec<ReviewItem>, ReconciliationServiceError> {
        Ok(self.repository.review_queue(limit)?)
    }

    fn process_one(
        &self,
        tx: &BankTransaction,
        snapshot: &mut [Registrant],
        session_date: Option<DateTime<Utc>>,
    ) -> Result<VerificationResult, ReconciliationServiceError> {
        if self.repository.is_processed(&tx.composite_key)? {
            debug!(key = %tx.composite_key, "transaction already processed; redelivery ignored");
            return Ok(already_processed(tx));
        }

        let outcome = self.engine.evaluate(tx, snapshot, session_date);
        let result = VerificationResult {
            transaction: tx.clone(),
            status: outcome.status,
            matched_registrants: outcome.candidates,
            message: outcome.message,
        };

        match result.status {
            VerificationStatus::Matched => self.apply_match(result, snapshot),
            VerificationStatus::Ambiguous => {
                warn!(
                    key = %tx.composite_key,
                    candidates = result.matched_registrants.len(),
                    "ambiguous deposit queued for manual resolution"
                );
                self.repository.record_review(&result)?;
                Ok(result)
            }
            VerificationStatus::NoMatch => {
                info!(key = %tx.composite_key, "deposit had no eligible registrant");
                self.repository.record_review(&result)?;
                Ok(result)
            }
            // The engine never classifies this; it only arises from the
            // guard above or a commit conflict.
            VerificationStatus::AlreadyProcessed => Ok(result),
        }
    }

    fn apply_match(
        &self,
        result: VerificationResult,
        snapshot: &mut [Registrant],
    ) -> Result<VerificationResult, ReconciliationServiceError> {
        let matched = result
            .matched_registrant()
            .cloned()
            .ok_or_else(|| ReconciliationServiceError::MissingCandidate {
                key: result.transaction.composite_key.to_string(),
            })?;

        let matched_at = Utc::now();
        let commit = MatchCommit {
            composite_key: result.transaction.composite_key.clone(),
            registrant_id: matched.id.clone(),
            message: result.message.clone(),
            matched_at,
        };

        match self.repository.commit_match(&commit) {
            Ok(()) => {}
            // Lost the race against a concurrent delivery of the same key:
            // someone else applied it, so this run reports idempotently.
            Err(RepositoryError::Conflict) => {
                debug!(key = %commit.composite_key, "commit conflict; treating as already processed");
                return Ok(already_processed(&result.transaction));
            }
            // Anything else leaves the key unrecorded on purpose: the
            // batch fails and a retry can still apply the match.
            Err(other) => return Err(other.into()),
        }

        if let Some(entry) = snapshot.iter_mut().find(|r| r.id == matched.id) {
            entry.payment_status = PaymentStatus::Paid;
        }

        info!(
            key = %commit.composite_key,
            registrant = %matched.id,
            amount = result.transaction.amount,
            "deposit matched and registrant marked paid"
        );

        let notice = PaymentMatchedNotice {
            composite_key: commit.composite_key.clone(),
            registrant_id: matched.id.clone(),
            registrant_name: matched.name.clone(),
            amount: result.transaction.amount,
            matched_at,
        };
        // The match is durable at this point; a delivery hiccup must not
        // unwind it or re-queue the key.
        if let Err(err) = self.notifier.publish(notice) {
            warn!(key = %commit.composite_key, error = %err, "payment notice failed to publish");
        }

        Ok(result)
    }
}

fn already_processed(tx: &BankTransaction) -> VerificationResult {
    VerificationResult {
        transaction: tx.clone(),
        status: VerificationStatus::AlreadyProcessed,
        matched_registrants: Vec::new(),
        message: "composite key already settled in a previous run".to_string(),
    }
}

fn validate_transaction(tx: &BankTransaction) -> Result<(), ReconciliationServiceError> {
    if tx.composite_key.bank_account_num.trim().is_empty()
        || tx.composite_key.trans_ref_key.trim().is_empty()
    {
        return Err(ReconciliationServiceError::InvalidTransaction {
            key: tx.composite_key.to_string(),
            reason: "composite key has an empty component".to_string(),
        });
    }
    if tx.amount == 0 {
        return Err(ReconciliationServiceError::InvalidTransaction {
            key: tx.composite_key.to_string(),
            reason: "amount must be a positive number of minor units".to_string(),
        });
    }
    Ok(())
}

/// Engine-level faults, distinct from the four domain dispositions: these
/// mean the integration is broken, not that a transaction failed to match.
#[derive(Debug, thiserror::Error)]
pub enum ReconciliationServiceError {
    #[error("invalid bank transaction {key}: {reason}")]
    InvalidTransaction { key: String, reason: String },
    #[error("matched disposition for {key} carried no candidate")]
    MissingCandidate { key: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
