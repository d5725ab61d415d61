use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::path::Path;

use crate::workflows::deposits::reconciliation::domain::{
    LifecycleStatus, PaymentStatus, Registrant, RegistrantId,
};

#[derive(Debug)]
pub enum RosterImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Record { line: usize, reason: String },
}

impl std::fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterImportError::Io(err) => write!(f, "failed to read registrant roster: {}", err),
            RosterImportError::Csv(err) => write!(f, "invalid roster CSV data: {}", err),
            RosterImportError::Record { line, reason } => {
                write!(f, "rejected roster line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io(err) => Some(err),
            RosterImportError::Csv(err) => Some(err),
            RosterImportError::Record { .. } => None,
        }
    }
}

impl From<std::io::Error> for RosterImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RosterImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(rename = "Registrant ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Ticket Price")]
    ticket_price: u64,
    #[serde(rename = "Payment Status", default)]
    payment_status: Option<String>,
    #[serde(rename = "Lifecycle Status", default)]
    lifecycle_status: Option<String>,
    #[serde(rename = "Submitted At", default, deserialize_with = "empty_string_as_none")]
    submitted_at: Option<String>,
    #[serde(rename = "Session Date", default, deserialize_with = "empty_string_as_none")]
    session_date: Option<String>,
}

/// Loader for registrant snapshot exports, used by CLI runs and ledger
/// seeding. The registrant store itself stays external; this only reads
/// what it exported.
pub struct RegistrantRosterImporter;

impl RegistrantRosterImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Registrant>, RosterImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<Registrant>, RosterImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut registrants = Vec::new();

        for (index, record) in csv_reader.deserialize::<RosterRow>().enumerate() {
            let line = index + 2;
            let row = record?;
            registrants.push(registrant_from_row(row, line)?);
        }

        Ok(registrants)
    }
}

fn registrant_from_row(row: RosterRow, line: usize) -> Result<Registrant, RosterImportError> {
    if row.id.is_empty() {
        return Err(RosterImportError::Record {
            line,
            reason: "missing registrant id".to_string(),
        });
    }

    let payment_status = match row.payment_status.as_deref() {
        None | Some("") | Some("pending") => PaymentStatus::Pending,
        Some("paid") => PaymentStatus::Paid,
        Some("refunded") => PaymentStatus::Refunded,
        Some(other) => {
            return Err(RosterImportError::Record {
                line,
                reason: format!("unknown payment status '{other}'"),
            })
        }
    };

    let lifecycle_status = match row.lifecycle_status.as_deref() {
        None | Some("") | Some("active") => LifecycleStatus::Active,
        Some("rejected") => LifecycleStatus::Rejected,
        Some("archived") => LifecycleStatus::Archived,
        Some(other) => {
            return Err(RosterImportError::Record {
                line,
                reason: format!("unknown lifecycle status '{other}'"),
            })
        }
    };

    let submitted_at = parse_optional(row.submitted_at.as_deref(), line, "Submitted At")?;
    let session_date = parse_optional(row.session_date.as_deref(), line, "Session Date")?;

    Ok(Registrant {
        id: RegistrantId(row.id),
        name: row.name,
        ticket_price: row.ticket_price,
        payment_status,
        lifecycle_status,
        submitted_at,
        session_date,
    })
}

fn parse_optional(
    value: Option<&str>,
    line: usize,
    column: &str,
) -> Result<Option<DateTime<Utc>>, RosterImportError> {
    let Some(raw) = value else {
        return Ok(None);
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(Some(dt.and_utc()));
    }

    Err(RosterImportError::Record {
        line,
        reason: format!("unparseable {column} '{raw}'"),
    })
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
