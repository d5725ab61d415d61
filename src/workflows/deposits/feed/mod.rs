mod parser;

use std::io::Read;
use std::path::Path;

use crate::workflows::deposits::reconciliation::domain::BankTransaction;

#[derive(Debug)]
pub enum BankFeedImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Record { line: usize, reason: String },
}

impl std::fmt::Display for BankFeedImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BankFeedImportError::Io(err) => write!(f, "failed to read bank export: {}", err),
            BankFeedImportError::Csv(err) => write!(f, "invalid bank CSV data: {}", err),
            BankFeedImportError::Record { line, reason } => {
                write!(f, "rejected bank export line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for BankFeedImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BankFeedImportError::Io(err) => Some(err),
            BankFeedImportError::Csv(err) => Some(err),
            BankFeedImportError::Record { .. } => None,
        }
    }
}

impl From<std::io::Error> for BankFeedImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for BankFeedImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Ingestion boundary for bank statement exports: every representation
/// quirk (timestamp spellings, thousands separators, localized direction
/// labels) is normalized here so the engine only ever sees canonical
/// records.
pub struct BankFeedImporter;

impl BankFeedImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<BankTransaction>, BankFeedImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<BankTransaction>, BankFeedImportError> {
        parser::parse_rows(reader)
    }
}
