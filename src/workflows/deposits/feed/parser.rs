use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::io::Read;

use super::BankFeedImportError;
use crate::workflows::deposits::reconciliation::domain::{
    BankTransaction, CompositeKey, TransactionDirection,
};

/// One raw row of a bank statement export. Header names follow the export
/// format of the upstream feed relay.
#[derive(Debug, Deserialize)]
struct FeedRow {
    #[serde(rename = "Account Number")]
    account_number: String,
    #[serde(rename = "Transaction Ref")]
    transaction_ref: String,
    #[serde(rename = "Posted At")]
    posted_at: String,
    #[serde(rename = "Direction")]
    direction: String,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Remark", default, deserialize_with = "empty_string_as_none")]
    remark: Option<String>,
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<BankTransaction>, BankFeedImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut transactions = Vec::new();

    for (index, record) in csv_reader.deserialize::<FeedRow>().enumerate() {
        // Header occupies line 1.
        let line = index + 2;
        let row = record?;
        transactions.push(transaction_from_row(row, line)?);
    }

    Ok(transactions)
}

fn transaction_from_row(row: FeedRow, line: usize) -> Result<BankTransaction, BankFeedImportError> {
    if row.account_number.is_empty() || row.transaction_ref.is_empty() {
        return Err(BankFeedImportError::Record {
            line,
            reason: "missing account number or transaction ref".to_string(),
        });
    }

    let trans_datetime = parse_datetime(&row.posted_at).ok_or_else(|| {
        BankFeedImportError::Record {
            line,
            reason: format!("unparseable posting time '{}'", row.posted_at),
        }
    })?;

    let direction = parse_direction(&row.direction).ok_or_else(|| BankFeedImportError::Record {
        line,
        reason: format!("unknown direction '{}'", row.direction),
    })?;

    let amount = parse_amount(&row.amount).ok_or_else(|| BankFeedImportError::Record {
        line,
        reason: format!("amount '{}' is not a positive minor-unit value", row.amount),
    })?;

    Ok(BankTransaction {
        composite_key: CompositeKey::new(row.account_number, row.transaction_ref),
        trans_datetime,
        direction,
        amount,
        remark: row.remark.unwrap_or_default(),
    })
}

/// Collapse the feed's timestamp spellings to one canonical UTC instant.
/// Everything past this function sees `DateTime<Utc>` and nothing else.
fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }

    None
}

fn parse_direction(value: &str) -> Option<TransactionDirection> {
    match value.trim().to_ascii_lowercase().as_str() {
        "deposit" | "credit" | "입금" => Some(TransactionDirection::Deposit),
        "withdrawal" | "debit" | "출금" => Some(TransactionDirection::Withdrawal),
        _ => None,
    }
}

fn parse_amount(value: &str) -> Option<u64> {
    let digits: String = value.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    match digits.parse::<u64>() {
        Ok(amount) if amount > 0 => Some(amount),
        _ => None,
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
pub(crate) fn parse_datetime_for_tests(value: &str) -> Option<DateTime<Utc>> {
    parse_datetime(value)
}

#[cfg(test)]
pub(crate) fn parse_amount_for_tests(value: &str) -> Option<u64> {
    parse_amount(value)
}
