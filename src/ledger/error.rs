use crate::model::SlotKey;

#[derive(Debug)]
pub enum LedgerError {
    InvalidRecord(&'static str),
    LimitExceeded(&'static str),
    BucketFull(SlotKey),
    JournalError(String),
    /// Backing store could not be reached. Used by non-journal ledgers.
    Unavailable(String),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::InvalidRecord(msg) => write!(f, "invalid reservation record: {msg}"),
            LedgerError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            LedgerError::BucketFull(key) => write!(f, "ledger bucket {key} is full"),
            LedgerError::JournalError(e) => write!(f, "journal error: {e}"),
            LedgerError::Unavailable(e) => write!(f, "ledger unavailable: {e}"),
        }
    }
}

impl std::error::Error for LedgerError {}
