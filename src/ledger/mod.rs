//! Tamper-evident ledger core
//!
//! Hash-chained, append-only entries with chain-walk verification and
//! integrity reporting.

pub mod builder;
pub mod entry;
pub mod report;
pub mod verify;

pub use builder::ChainEntryBuilder;
pub use entry::{LedgerEntry, DEFAULT_DIFFICULTY, GENESIS_PREVIOUS_HASH};
pub use report::{IntegrityReport, IntegrityReportService};
pub use verify::{BreakKind, ChainVerifier, VerificationResult};
