pub mod feed;
pub mod reconciliation;
pub mod roster;

pub use feed::{BankFeedImportError, BankFeedImporter};
pub use roster::{RegistrantRosterImporter, RosterImportError};
