//! Integrity Report Service
//!
//! Aggregates verifier output into a summary for external consumption.
//! A derived, read-only view over Verifier + Store; holds no state of
//! its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::entry::LedgerEntry;
use crate::ledger::verify::{BreakKind, ChainVerifier, VerificationResult};

/// Trimmed entry view exposed in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrySummary {
    pub entry_id: Uuid,
    pub sequence_number: i64,
    pub entry_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<&LedgerEntry> for EntrySummary {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            entry_id: entry.entry_id,
            sequence_number: entry.sequence_number,
            entry_hash: entry.entry_hash.clone(),
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub total_entries: u64,
    /// Entries from the break point onward: once the chain is broken, no
    /// later entry can be trusted to have the claimed lineage.
    pub invalid_entries: u64,
    pub integrity_percentage: f64,
    pub earliest_entry: Option<EntrySummary>,
    pub latest_entry: Option<EntrySummary>,
    pub valid: bool,
    pub break_point: Option<i64>,
    pub break_kind: Option<BreakKind>,
    pub checked_at: DateTime<Utc>,
}

pub struct IntegrityReportService {
    verifier: ChainVerifier,
}

impl IntegrityReportService {
    pub fn new(verifier: ChainVerifier) -> Self {
        Self { verifier }
    }

    /// Run a full verification pass and summarize the findings.
    ///
    /// An empty ledger reports 100% integrity.
    pub async fn report(&self) -> Result<IntegrityReport, LedgerError> {
        let result = self.verifier.verify_chain().await?;
        self.report_from(&result).await
    }

    /// Summarize an already-completed verification pass, avoiding a
    /// second chain walk when the caller has just verified (for example
    /// to refresh the validity cache).
    pub async fn report_from(
        &self,
        result: &VerificationResult,
    ) -> Result<IntegrityReport, LedgerError> {
        let entries = self.verifier.store().scan_ascending().await?;

        let total_entries = entries.len() as u64;
        let invalid_entries = match result.first_break {
            None => 0,
            Some(break_seq) => total_entries - (break_seq as u64) + 1,
        };

        let integrity_percentage = if total_entries == 0 {
            100.0
        } else {
            (total_entries - invalid_entries) as f64 / total_entries as f64 * 100.0
        };

        Ok(IntegrityReport {
            total_entries,
            invalid_entries,
            integrity_percentage,
            earliest_entry: entries.first().map(EntrySummary::from),
            latest_entry: entries.last().map(EntrySummary::from),
            valid: result.valid,
            break_point: result.first_break,
            break_kind: result.reason,
            checked_at: Utc::now(),
        })
    }
}

impl IntegrityReport {
    /// Human-readable summary for CLI output.
    pub fn summary(&self) -> String {
        if self.valid {
            format!(
                "Ledger intact: {} entries, 100% integrity",
                self.total_entries
            )
        } else {
            format!(
                "Ledger BROKEN at sequence {} ({:?}): {} of {} entries compromised, {:.2}% integrity",
                self.break_point.unwrap_or_default(),
                self.break_kind,
                self.invalid_entries,
                self.total_entries,
                self.integrity_percentage
            )
        }
    }
}
