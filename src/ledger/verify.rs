//! Chain Verifier
//!
//! Walks the full ordered entry sequence and confirms linkage and hash
//! integrity, reporting the first point of corruption. A broken chain is
//! a normal verification result, never an error: detecting tampering is
//! the verifier's job.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::ledger::entry::{LedgerEntry, GENESIS_PREVIOUS_HASH};
use crate::store::LedgerStore;

/// What failed at the first broken entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakKind {
    /// `previous_hash` does not match the predecessor's `entry_hash`:
    /// reordering, deletion, or insertion.
    LinkageMismatch,
    /// The entry's own hash does not match its recomputed value: content
    /// tampering.
    HashMismatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    /// Sequence number of the first failing entry, if any.
    pub first_break: Option<i64>,
    pub reason: Option<BreakKind>,
    pub entries_checked: u64,
}

impl VerificationResult {
    fn intact(entries_checked: u64) -> Self {
        Self {
            valid: true,
            first_break: None,
            reason: None,
            entries_checked,
        }
    }

    fn broken(sequence_number: i64, reason: BreakKind, entries_checked: u64) -> Self {
        Self {
            valid: false,
            first_break: Some(sequence_number),
            reason: Some(reason),
            entries_checked,
        }
    }
}

pub struct ChainVerifier {
    store: LedgerStore,
}

impl ChainVerifier {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Read-only O(n) pass over the full chain. An empty ledger is valid
    /// by definition. Stops at the first failing entry.
    pub async fn verify_chain(&self) -> Result<VerificationResult, LedgerError> {
        let entries = self.store.scan_ascending().await?;
        let result = check_entries(&entries);

        if result.valid {
            info!(
                "Chain verification passed: {} entries intact",
                result.entries_checked
            );
        } else {
            warn!(
                "Chain verification failed at sequence {:?}: {:?}",
                result.first_break, result.reason
            );
        }
        Ok(result)
    }

    /// Verify and refresh the advisory `is_valid` cache. The cache never
    /// feeds back into verification, so repeated runs yield identical
    /// results.
    pub async fn verify_and_refresh(&self) -> Result<VerificationResult, LedgerError> {
        let result = self.verify_chain().await?;
        self.store.refresh_validity(result.first_break).await?;
        debug!("Validity cache refreshed (break: {:?})", result.first_break);
        Ok(result)
    }
}

/// Chain-walk over an in-memory snapshot. For each entry beyond the
/// first: (a) linkage to the predecessor's hash, then (b) entry-hash
/// recomputation. The first entry is checked for the genesis sentinel
/// and (b) only.
pub fn check_entries(entries: &[LedgerEntry]) -> VerificationResult {
    let total = entries.len() as u64;

    for (i, entry) in entries.iter().enumerate() {
        let expected_previous = if i == 0 {
            GENESIS_PREVIOUS_HASH
        } else {
            entries[i - 1].entry_hash.as_str()
        };

        if entry.previous_hash != expected_previous {
            return VerificationResult::broken(
                entry.sequence_number,
                BreakKind::LinkageMismatch,
                i as u64 + 1,
            );
        }

        if !entry.verify_hash() {
            return VerificationResult::broken(
                entry.sequence_number,
                BreakKind::HashMismatch,
                i as u64 + 1,
            );
        }
    }

    VerificationResult::intact(total)
}
