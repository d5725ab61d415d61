use chrono::{DateTime, Utc};

use super::super::domain::{BankTransaction, LifecycleStatus, Registrant};
use super::super::normalize::{names_match, normalize_name};
use super::config::MatchPolicy;

/// Narrow the registrant pool to those structurally eligible to be the
/// payer of `tx`. Every rule is conjunctive; no side effects, safe to call
/// repeatedly and concurrently.
pub(crate) fn eligible_candidates<'a>(
    tx: &BankTransaction,
    pool: &'a [Registrant],
    session_date: Option<DateTime<Utc>>,
    policy: &MatchPolicy,
) -> Vec<&'a Registrant> {
    if !tx.is_deposit() {
        return Vec::new();
    }

    pool.iter()
        .filter(|registrant| is_eligible(tx, registrant, session_date, policy))
        .collect()
}

fn is_eligible(
    tx: &BankTransaction,
    registrant: &Registrant,
    session_date: Option<DateTime<Utc>>,
    policy: &MatchPolicy,
) -> bool {
    if registrant.payment_status.is_settled() {
        return false;
    }
    if !matches!(registrant.lifecycle_status, LifecycleStatus::Active) {
        return false;
    }

    // Exact amount only; partial and overpayment are out of scope.
    if registrant.ticket_price != tx.amount {
        return false;
    }

    if normalize_name(&registrant.name).chars().count() < policy.min_name_chars {
        return false;
    }

    if !names_match(&tx.remark, &registrant.name) {
        return false;
    }

    within_window(tx, registrant, session_date, policy)
}

/// Temporal window: a legitimate payment cannot predate the application by
/// more than the grace buffer, and cannot postdate the event itself (or
/// the fallback window when no event date is known). A registrant with no
/// submission time fails closed. Both bounds are inclusive.
fn within_window(
    tx: &BankTransaction,
    registrant: &Registrant,
    session_date: Option<DateTime<Utc>>,
    policy: &MatchPolicy,
) -> bool {
    let Some(submitted_at) = registrant.submitted_at else {
        return false;
    };

    let lower = submitted_at - policy.early_payment_grace();
    let upper = registrant
        .session_date
        .or(session_date)
        .unwrap_or_else(|| submitted_at + policy.fallback_window());

    lower <= tx.trans_datetime && tx.trans_datetime <= upper
}
