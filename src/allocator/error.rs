use crate::ledger::LedgerError;
use crate::reference::ReferenceError;

#[derive(Debug)]
pub enum AllocationError {
    /// Committed quantity could not be read; no safe decision is possible.
    Ledger(LedgerError),
    Reference(ReferenceError),
    /// The fixed-point loop ran past its bound. Only possible when the ledger
    /// changes underneath a run.
    PassLimitExceeded { passes: usize, limit: usize },
    LimitExceeded(&'static str),
}

impl std::fmt::Display for AllocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocationError::Ledger(e) => write!(f, "ledger read failed: {e}"),
            AllocationError::Reference(e) => write!(f, "reference lookup failed: {e}"),
            AllocationError::PassLimitExceeded { passes, limit } => {
                write!(f, "allocation did not settle: {passes} passes exceeds bound {limit}")
            }
            AllocationError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for AllocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AllocationError::Ledger(e) => Some(e),
            AllocationError::Reference(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LedgerError> for AllocationError {
    fn from(e: LedgerError) -> Self {
        AllocationError::Ledger(e)
    }
}

impl From<ReferenceError> for AllocationError {
    fn from(e: ReferenceError) -> Self {
        AllocationError::Reference(e)
    }
}
