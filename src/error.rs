use thiserror::Error;
use uuid::Uuid;

/// Error taxonomy for the ledger core.
///
/// A broken chain is never an error: tampering is reported as a normal
/// verification result, not through this enum.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Transaction {0} already has a ledger entry")]
    DuplicateTransaction(Uuid),

    #[error("Append conflict: {0}")]
    AppendConflict(String),

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("Stored entry is malformed: {0}")]
    CorruptRecord(String),
}

impl LedgerError {
    /// Transient errors are retried by the append path; everything else
    /// propagates to the caller unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AppendConflict(_))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        Self::LedgerUnavailable(format!("Database error: {}", err))
    }
}
