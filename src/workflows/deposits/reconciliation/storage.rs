use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode};

use super::domain::{
    CompositeKey, LifecycleStatus, PaymentStatus, Registrant, RegistrantId, VerificationResult,
};
use super::repository::{MatchCommit, ReconciliationRepository, RepositoryError, ReviewItem};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS registrants (
    id               TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    ticket_price     INTEGER NOT NULL,
    payment_status   TEXT NOT NULL,
    lifecycle_status TEXT NOT NULL,
    submitted_at     TEXT,
    session_date     TEXT
);

CREATE TABLE IF NOT EXISTS processed_transactions (
    composite_key TEXT PRIMARY KEY,
    registrant_id TEXT NOT NULL,
    message       TEXT NOT NULL,
    matched_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS review_queue (
    composite_key TEXT PRIMARY KEY,
    payload       TEXT NOT NULL,
    recorded_at   TEXT NOT NULL
);
";

/// SQLite-backed ledger: registrant snapshot, processed-key table, and the
/// manual review queue in one file. The `PRIMARY KEY` on
/// `processed_transactions.composite_key` is what turns webhook redelivery
/// into a safe `Conflict` instead of a double payment.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path).map_err(unavailable)?;
        Self::with_connection(conn)
    }

    /// Private, throwaway ledger for CLI runs and tests.
    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch(SCHEMA).map_err(unavailable)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Load or refresh the registrant snapshot, e.g. from a roster import.
    /// Settled registrants keep their status; this is an upsert of the
    /// collaborator-owned fields only.
    pub fn seed_registrants(&self, registrants: &[Registrant]) -> Result<(), RepositoryError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(unavailable)?;
        for registrant in registrants {
            tx.execute(
                "INSERT INTO registrants
                     (id, name, ticket_price, payment_status, lifecycle_status, submitted_at, session_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     ticket_price = excluded.ticket_price,
                     lifecycle_status = excluded.lifecycle_status,
                     submitted_at = excluded.submitted_at,
                     session_date = excluded.session_date",
                params![
                    registrant.id.0,
                    registrant.name,
                    registrant.ticket_price as i64,
                    registrant.payment_status.label(),
                    registrant.lifecycle_status.label(),
                    registrant.submitted_at.map(|at| at.to_rfc3339()),
                    registrant.session_date.map(|at| at.to_rfc3339()),
                ],
            )
            .map_err(unavailable)?;
        }
        tx.commit().map_err(unavailable)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|_| RepositoryError::Unavailable("ledger mutex poisoned".to_string()))
    }
}

impl ReconciliationRepository for SqliteLedger {
    fn registrant_pool(&self) -> Result<Vec<Registrant>, RepositoryError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(
                "SELECT id, name, ticket_price, payment_status, lifecycle_status,
                        submitted_at, session_date
                 FROM registrants ORDER BY id",
            )
            .map_err(unavailable)?;

        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })
            .map_err(unavailable)?;

        let mut pool = Vec::new();
        for row in rows {
            let (id, name, ticket_price, payment, lifecycle, submitted_at, session_date) =
                row.map_err(unavailable)?;
            pool.push(Registrant {
                id: RegistrantId(id),
                name,
                ticket_price: ticket_price.max(0) as u64,
                payment_status: payment_status_from_label(&payment)?,
                lifecycle_status: lifecycle_status_from_label(&lifecycle)?,
                submitted_at: parse_optional_timestamp(submitted_at.as_deref())?,
                session_date: parse_optional_timestamp(session_date.as_deref())?,
            });
        }
        Ok(pool)
    }

    fn is_processed(&self, key: &CompositeKey) -> Result<bool, RepositoryError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare("SELECT 1 FROM processed_transactions WHERE composite_key = ?1")
            .map_err(unavailable)?;
        statement
            .exists(params![key.as_storage_key()])
            .map_err(unavailable)
    }

    fn commit_match(&self, commit: &MatchCommit) -> Result<(), RepositoryError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(unavailable)?;

        // Key insert first so redelivery fails before any registrant write.
        tx.execute(
            "INSERT INTO processed_transactions (composite_key, registrant_id, message, matched_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                commit.composite_key.as_storage_key(),
                commit.registrant_id.0,
                commit.message,
                commit.matched_at.to_rfc3339(),
            ],
        )
        .map_err(map_insert_error)?;

        let updated = tx
            .execute(
                "UPDATE registrants SET payment_status = ?1
                 WHERE id = ?2 AND payment_status = ?3",
                params![
                    PaymentStatus::Paid.label(),
                    commit.registrant_id.0,
                    PaymentStatus::Pending.label(),
                ],
            )
            .map_err(unavailable)?;
        if updated == 0 {
            // Rolls back the key insert on drop; the transaction stays
            // unprocessed and a later retry can still succeed.
            return Err(RepositoryError::NotFound);
        }

        // A transaction that finally matched no longer needs follow-up.
        tx.execute(
            "DELETE FROM review_queue WHERE composite_key = ?1",
            params![commit.composite_key.as_storage_key()],
        )
        .map_err(unavailable)?;

        tx.commit().map_err(unavailable)
    }

    fn record_review(&self, result: &VerificationResult) -> Result<(), RepositoryError> {
        let item = ReviewItem {
            transaction: result.transaction.clone(),
            status: result.status,
            candidates: result.matched_registrants.clone(),
            message: result.message.clone(),
            recorded_at: Utc::now(),
        };
        let payload = serde_json::to_string(&item)
            .map_err(|err| RepositoryError::Unavailable(err.to_string()))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO review_queue (composite_key, payload, recorded_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(composite_key) DO UPDATE SET
                 payload = excluded.payload,
                 recorded_at = excluded.recorded_at",
            params![
                result.transaction.composite_key.as_storage_key(),
                payload,
                item.recorded_at.to_rfc3339(),
            ],
        )
        .map_err(unavailable)?;
        Ok(())
    }

    fn review_queue(&self, limit: usize) -> Result<Vec<ReviewItem>, RepositoryError> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare("SELECT payload FROM review_queue ORDER BY recorded_at ASC LIMIT ?1")
            .map_err(unavailable)?;
        let rows = statement
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))
            .map_err(unavailable)?;

        let mut items = Vec::new();
        for payload in rows {
            let payload = payload.map_err(unavailable)?;
            let item: ReviewItem = serde_json::from_str(&payload)
                .map_err(|err| RepositoryError::Unavailable(err.to_string()))?;
            items.push(item);
        }
        Ok(items)
    }
}

fn unavailable(err: rusqlite::Error) -> RepositoryError {
    RepositoryError::Unavailable(err.to_string())
}

fn map_insert_error(err: rusqlite::Error) -> RepositoryError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            RepositoryError::Conflict
        }
        _ => unavailable(err),
    }
}

fn payment_status_from_label(label: &str) -> Result<PaymentStatus, RepositoryError> {
    match label {
        "pending" => Ok(PaymentStatus::Pending),
        "paid" => Ok(PaymentStatus::Paid),
        "refunded" => Ok(PaymentStatus::Refunded),
        other => Err(RepositoryError::Unavailable(format!(
            "unknown payment status '{other}' in ledger"
        ))),
    }
}

fn lifecycle_status_from_label(label: &str) -> Result<LifecycleStatus, RepositoryError> {
    match label {
        "active" => Ok(LifecycleStatus::Active),
        "rejected" => Ok(LifecycleStatus::Rejected),
        "archived" => Ok(LifecycleStatus::Archived),
        other => Err(RepositoryError::Unavailable(format!(
            "unknown lifecycle status '{other}' in ledger"
        ))),
    }
}

fn parse_optional_timestamp(value: Option<&str>) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|err| {
                    RepositoryError::Unavailable(format!("corrupt timestamp '{raw}': {err}"))
                })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::deposits::reconciliation::domain::{
        BankTransaction, CandidateRef, TransactionDirection, VerificationStatus,
    };
    use chrono::TimeZone;

    fn pending_registrant(id: &str, name: &str) -> Registrant {
        Registrant {
            id: RegistrantId(id.to_string()),
            name: name.to_string(),
            ticket_price: 30_000,
            payment_status: PaymentStatus::Pending,
            lifecycle_status: LifecycleStatus::Active,
            submitted_at: Some(Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 0).single().expect("valid")),
            session_date: None,
        }
    }

    fn commit_for(key: &str, registrant: &str) -> MatchCommit {
        MatchCommit {
            composite_key: CompositeKey::new("110-222", key),
            registrant_id: RegistrantId(registrant.to_string()),
            message: "matched".to_string(),
            matched_at: Utc.with_ymd_and_hms(2025, 11, 3, 10, 0, 0).single().expect("valid"),
        }
    }

    #[test]
    fn commit_then_redeliver_yields_conflict() {
        let ledger = SqliteLedger::open_in_memory().expect("ledger opens");
        ledger
            .seed_registrants(&[pending_registrant("r-1", "홍길동")])
            .expect("seed");

        ledger.commit_match(&commit_for("TRX-1", "r-1")).expect("first commit");
        assert!(ledger
            .is_processed(&CompositeKey::new("110-222", "TRX-1"))
            .expect("check"));

        // Same key again: the unique constraint answers, not the caller.
        match ledger.commit_match(&commit_for("TRX-1", "r-1")) {
            Err(RepositoryError::Conflict) => {}
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn commit_marks_registrant_paid_exactly_once() {
        let ledger = SqliteLedger::open_in_memory().expect("ledger opens");
        ledger
            .seed_registrants(&[pending_registrant("r-1", "홍길동")])
            .expect("seed");

        ledger.commit_match(&commit_for("TRX-1", "r-1")).expect("commit");
        let pool = ledger.registrant_pool().expect("pool");
        assert_eq!(pool[0].payment_status, PaymentStatus::Paid);

        // A different key against the now-paid registrant is rejected and
        // leaves that key unprocessed.
        match ledger.commit_match(&commit_for("TRX-2", "r-1")) {
            Err(RepositoryError::NotFound) => {}
            other => panic!("expected not-found, got {other:?}"),
        }
        assert!(!ledger
            .is_processed(&CompositeKey::new("110-222", "TRX-2"))
            .expect("check"));
    }

    #[test]
    fn seeding_twice_preserves_settled_status() {
        let ledger = SqliteLedger::open_in_memory().expect("ledger opens");
        let registrant = pending_registrant("r-1", "홍길동");
        ledger.seed_registrants(&[registrant.clone()]).expect("seed");
        ledger.commit_match(&commit_for("TRX-1", "r-1")).expect("commit");

        // Re-import of the same roster row must not resurrect `pending`.
        ledger.seed_registrants(&[registrant]).expect("reseed");
        let pool = ledger.registrant_pool().expect("pool");
        assert_eq!(pool[0].payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn review_queue_replaces_entries_per_key_and_clears_on_match() {
        let ledger = SqliteLedger::open_in_memory().expect("ledger opens");
        ledger
            .seed_registrants(&[pending_registrant("r-1", "홍길동")])
            .expect("seed");

        let tx = BankTransaction {
            composite_key: CompositeKey::new("110-222", "TRX-9"),
            trans_datetime: Utc.with_ymd_and_hms(2025, 11, 3, 9, 30, 0).single().expect("valid"),
            direction: TransactionDirection::Deposit,
            amount: 30_000,
            remark: "모르는이름".to_string(),
        };
        let result = VerificationResult {
            transaction: tx.clone(),
            status: VerificationStatus::NoMatch,
            matched_registrants: Vec::new(),
            message: "no eligible registrant".to_string(),
        };

        ledger.record_review(&result).expect("record");
        let mut ambiguous = result.clone();
        ambiguous.status = VerificationStatus::Ambiguous;
        ambiguous.matched_registrants = vec![CandidateRef {
            id: RegistrantId("r-1".to_string()),
            name: "홍길동".to_string(),
        }];
        ledger.record_review(&ambiguous).expect("replace");

        let queue = ledger.review_queue(10).expect("queue");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].status, VerificationStatus::Ambiguous);

        // Once the same key commits, follow-up is no longer needed.
        let commit = MatchCommit {
            composite_key: CompositeKey::new("110-222", "TRX-9"),
            registrant_id: RegistrantId("r-1".to_string()),
            message: "matched".to_string(),
            matched_at: Utc.with_ymd_and_hms(2025, 11, 3, 10, 0, 0).single().expect("valid"),
        };
        ledger.commit_match(&commit).expect("commit");
        assert!(ledger.review_queue(10).expect("queue").is_empty());
    }
}
