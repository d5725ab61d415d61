use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use crate::workflows::deposits::reconciliation::domain::{
    BankTransaction, CompositeKey, LifecycleStatus, PaymentMatchedNotice, PaymentStatus,
    Registrant, RegistrantId, TransactionDirection, VerificationResult,
};
use crate::workflows::deposits::reconciliation::matching::MatchPolicy;
use crate::workflows::deposits::reconciliation::repository::{
    MatchCommit, NotifyError, PaymentNotifier, ReconciliationRepository, RepositoryError,
    ReviewItem,
};
use crate::workflows::deposits::reconciliation::router::reconciliation_router;
use crate::workflows::deposits::reconciliation::service::DepositReconciliationService;

/// Batch reference instant: 2025-11-03 10:00 UTC. Fixtures are offsets
/// from here.
pub(super) fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 3, 10, 0, 0)
        .single()
        .expect("valid base time")
}

pub(super) fn minutes(count: i64) -> chrono::Duration {
    chrono::Duration::minutes(count)
}

pub(super) fn pending_registrant(id: &str, name: &str, ticket_price: u64) -> Registrant {
    Registrant {
        id: RegistrantId(id.to_string()),
        name: name.to_string(),
        ticket_price,
        payment_status: PaymentStatus::Pending,
        lifecycle_status: LifecycleStatus::Active,
        submitted_at: Some(base_time() - minutes(10)),
        session_date: None,
    }
}

pub(super) fn deposit(ref_key: &str, amount: u64, remark: &str) -> BankTransaction {
    BankTransaction {
        composite_key: CompositeKey::new("110-222-333", ref_key),
        trans_datetime: base_time(),
        direction: TransactionDirection::Deposit,
        amount,
        remark: remark.to_string(),
    }
}

pub(super) fn withdrawal(ref_key: &str, amount: u64, remark: &str) -> BankTransaction {
    BankTransaction {
        direction: TransactionDirection::Withdrawal,
        ..deposit(ref_key, amount, remark)
    }
}

pub(super) fn policy() -> MatchPolicy {
    MatchPolicy::default()
}

pub(super) fn build_service() -> (
    DepositReconciliationService<MemoryLedger, MemoryNotifier>,
    Arc<MemoryLedger>,
    Arc<MemoryNotifier>,
) {
    let ledger = Arc::new(MemoryLedger::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = DepositReconciliationService::new(ledger.clone(), notifier.clone(), policy());
    (service, ledger, notifier)
}

pub(super) fn router_with_service(
    service: DepositReconciliationService<MemoryLedger, MemoryNotifier>,
) -> axum::Router {
    reconciliation_router(Arc::new(service))
}

#[derive(Default)]
struct LedgerState {
    registrants: Vec<Registrant>,
    processed: HashMap<String, MatchCommit>,
    reviews: Vec<ReviewItem>,
}

/// In-memory double honoring the same atomicity contract as the SQLite
/// ledger: one mutex acquisition covers the whole commit.
#[derive(Default)]
pub(super) struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub(super) fn seed(&self, registrants: Vec<Registrant>) {
        let mut state = self.state.lock().expect("ledger mutex poisoned");
        state.registrants = registrants;
    }

    pub(super) fn add_registrant(&self, registrant: Registrant) {
        let mut state = self.state.lock().expect("ledger mutex poisoned");
        state.registrants.push(registrant);
    }

    pub(super) fn paid_ids(&self) -> Vec<RegistrantId> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        state
            .registrants
            .iter()
            .filter(|r| r.payment_status == PaymentStatus::Paid)
            .map(|r| r.id.clone())
            .collect()
    }

    pub(super) fn processed_keys(&self) -> Vec<String> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        let mut keys: Vec<String> = state.processed.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl ReconciliationRepository for MemoryLedger {
    fn registrant_pool(&self) -> Result<Vec<Registrant>, RepositoryError> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        Ok(state.registrants.clone())
    }

    fn is_processed(&self, key: &CompositeKey) -> Result<bool, RepositoryError> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        Ok(state.processed.contains_key(&key.as_storage_key()))
    }

    fn commit_match(&self, commit: &MatchCommit) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("ledger mutex poisoned");
        let storage_key = commit.composite_key.as_storage_key();
        if state.processed.contains_key(&storage_key) {
            return Err(RepositoryError::Conflict);
        }

        let registrant = state
            .registrants
            .iter_mut()
            .find(|r| r.id == commit.registrant_id && r.payment_status == PaymentStatus::Pending)
            .ok_or(RepositoryError::NotFound)?;
        registrant.payment_status = PaymentStatus::Paid;

        state.processed.insert(storage_key.clone(), commit.clone());
        state
            .reviews
            .retain(|item| item.transaction.composite_key.as_storage_key() != storage_key);
        Ok(())
    }

    fn record_review(&self, result: &VerificationResult) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("ledger mutex poisoned");
        let storage_key = result.transaction.composite_key.as_storage_key();
        state
            .reviews
            .retain(|item| item.transaction.composite_key.as_storage_key() != storage_key);
        state.reviews.push(ReviewItem {
            transaction: result.transaction.clone(),
            status: result.status,
            candidates: result.matched_registrants.clone(),
            message: result.message.clone(),
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    fn review_queue(&self, limit: usize) -> Result<Vec<ReviewItem>, RepositoryError> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        Ok(state.reviews.iter().take(limit).cloned().collect())
    }
}

/// Repository whose commit always loses the redelivery race.
pub(super) struct RacingLedger {
    pub(super) inner: MemoryLedger,
}

impl ReconciliationRepository for RacingLedger {
    fn registrant_pool(&self) -> Result<Vec<Registrant>, RepositoryError> {
        self.inner.registrant_pool()
    }

    fn is_processed(&self, _key: &CompositeKey) -> Result<bool, RepositoryError> {
        // The fast path says "new"; the constraint says otherwise below.
        Ok(false)
    }

    fn commit_match(&self, _commit: &MatchCommit) -> Result<(), RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn record_review(&self, result: &VerificationResult) -> Result<(), RepositoryError> {
        self.inner.record_review(result)
    }

    fn review_queue(&self, limit: usize) -> Result<Vec<ReviewItem>, RepositoryError> {
        self.inner.review_queue(limit)
    }
}

pub(super) struct UnavailableLedger;

impl ReconciliationRepository for UnavailableLedger {
    fn registrant_pool(&self) -> Result<Vec<Registrant>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn is_processed(&self, _key: &CompositeKey) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn commit_match(&self, _commit: &MatchCommit) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn record_review(&self, _result: &VerificationResult) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn review_queue(&self, _limit: usize) -> Result<Vec<ReviewItem>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    notices: Mutex<Vec<PaymentMatchedNotice>>,
}

impl MemoryNotifier {
    pub(super) fn notices(&self) -> Vec<PaymentMatchedNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

impl PaymentNotifier for MemoryNotifier {
    fn publish(&self, notice: PaymentMatchedNotice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl PaymentNotifier for FailingNotifier {
    fn publish(&self, _notice: PaymentMatchedNotice) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("sms gateway offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
