use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for one bank ledger line: account number plus the
/// bank-assigned reference key. The unit of idempotency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompositeKey {
    pub bank_account_num: String,
    pub trans_ref_key: String,
}

impl CompositeKey {
    pub fn new(bank_account_num: impl Into<String>, trans_ref_key: impl Into<String>) -> Self {
        Self {
            bank_account_num: bank_account_num.into(),
            trans_ref_key: trans_ref_key.into(),
        }
    }

    /// Canonical single-column encoding used by the ledger and audit rows.
    pub fn as_storage_key(&self) -> String {
        format!("{}:{}", self.bank_account_num, self.trans_ref_key)
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bank_account_num, self.trans_ref_key)
    }
}

/// Whether a ledger line moved money into or out of the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionDirection {
    Deposit,
    Withdrawal,
}

/// One parsed line from the bank feed. Immutable once ingested; the feed
/// boundary has already collapsed timestamps to UTC and amounts to the
/// minor currency unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub composite_key: CompositeKey,
    pub trans_datetime: DateTime<Utc>,
    pub direction: TransactionDirection,
    pub amount: u64,
    pub remark: String,
}

impl BankTransaction {
    pub fn is_deposit(&self) -> bool {
        self.direction == TransactionDirection::Deposit
    }
}

/// Identifier wrapper for registrants awaiting payment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegistrantId(pub String);

impl fmt::Display for RegistrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payment settlement state. `Paid` and `Refunded` are both settled and
/// permanently ineligible for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub const fn is_settled(self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Refunded)
    }
}

/// Application lifecycle state, owned by the registration store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    Active,
    Rejected,
    Archived,
}

impl LifecycleStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LifecycleStatus::Active => "active",
            LifecycleStatus::Rejected => "rejected",
            LifecycleStatus::Archived => "archived",
        }
    }
}

/// Read-only snapshot of one applicant awaiting payment for a ticketed
/// event occurrence. The engine mutates nothing here directly; the single
/// allowed transition (`pending -> paid`) goes through the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registrant {
    pub id: RegistrantId,
    pub name: String,
    /// Expected exact amount in the minor currency unit.
    pub ticket_price: u64,
    pub payment_status: PaymentStatus,
    pub lifecycle_status: LifecycleStatus,
    /// Missing submission time means eligibility cannot be verified; such
    /// registrants are never candidates.
    pub submitted_at: Option<DateTime<Utc>>,
    pub session_date: Option<DateTime<Utc>>,
}

/// Disposition assigned to one transaction by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Matched,
    Ambiguous,
    NoMatch,
    AlreadyProcessed,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationStatus::Matched => "matched",
            VerificationStatus::Ambiguous => "ambiguous",
            VerificationStatus::NoMatch => "no_match",
            VerificationStatus::AlreadyProcessed => "already_processed",
        }
    }

    /// Only `Matched` carries a side effect; everything else is surfaced
    /// for follow-up or silently idempotent.
    pub const fn has_side_effect(self) -> bool {
        matches!(self, VerificationStatus::Matched)
    }
}

/// Lightweight registrant reference carried inside results so the admin
/// surface can render candidates without a second lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRef {
    pub id: RegistrantId,
    pub name: String,
}

impl CandidateRef {
    pub fn from_registrant(registrant: &Registrant) -> Self {
        Self {
            id: registrant.id.clone(),
            name: registrant.name.clone(),
        }
    }
}

/// The engine's output for one transaction: exactly one per input record
/// per run, whatever the disposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub transaction: BankTransaction,
    pub status: VerificationStatus,
    pub matched_registrants: Vec<CandidateRef>,
    pub message: String,
}

impl VerificationResult {
    /// The single matched registrant, when the disposition allows exactly one.
    pub fn matched_registrant(&self) -> Option<&CandidateRef> {
        match self.status {
            VerificationStatus::Matched => self.matched_registrants.first(),
            _ => None,
        }
    }
}

/// Instruction emitted toward the external registrant store after a match
/// commits, so downstream notification flows can fire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMatchedNotice {
    pub composite_key: CompositeKey,
    pub registrant_id: RegistrantId,
    pub registrant_name: String,
    pub amount: u64,
    pub matched_at: DateTime<Utc>,
}
