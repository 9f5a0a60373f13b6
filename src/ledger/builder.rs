//! Chain Entry Builder
//!
//! Assembles a new ledger entry for a finalized transaction: links it to
//! the previous entry's hash, computes its own hash, and assigns the next
//! sequence number. The read-tail/compute/append sequence is protected by
//! the store's compare-and-append: the loser of a concurrent race retries
//! from a fresh tail, up to a bound.

use chrono::{SubsecRound, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::fingerprint::{self, TransactionFields};
use crate::ledger::entry::{LedgerEntry, DEFAULT_DIFFICULTY, GENESIS_PREVIOUS_HASH};
use crate::store::LedgerStore;

pub const DEFAULT_MAX_APPEND_RETRIES: u32 = 3;

#[derive(Clone)]
pub struct ChainEntryBuilder {
    store: LedgerStore,
    max_append_retries: u32,
}

impl ChainEntryBuilder {
    pub fn new(store: LedgerStore) -> Self {
        Self {
            store,
            max_append_retries: DEFAULT_MAX_APPEND_RETRIES,
        }
    }

    pub fn with_max_retries(store: LedgerStore, max_append_retries: u32) -> Self {
        Self {
            store,
            max_append_retries,
        }
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Append one ledger entry for a finalized transaction.
    ///
    /// Exactly one entry may exist per transaction: a repeated call for
    /// the same `transaction_id` fails with `DuplicateTransaction`, which
    /// the finalize workflow treats as idempotent success. Append races
    /// are retried internally; `LedgerUnavailable` after the retry budget
    /// is exhausted.
    pub async fn append(
        &self,
        transaction_id: Uuid,
        fields: &TransactionFields,
        validator_id: Uuid,
    ) -> Result<LedgerEntry, LedgerError> {
        // Reject partial records before touching the chain
        let content_root = fingerprint::content_root(transaction_id, fields)?;

        // Idempotency guard; the unique constraint backstops the race
        if let Some(existing) = self.store.find_by_transaction(transaction_id).await? {
            debug!(
                "Transaction {} already recorded as entry {}",
                transaction_id, existing.summary()
            );
            return Err(LedgerError::DuplicateTransaction(transaction_id));
        }

        let mut attempt = 0;
        loop {
            let entry = self.build_entry(transaction_id, &content_root, validator_id).await?;

            match self.store.append(&entry).await {
                Ok(()) => {
                    debug!("Ledger append succeeded: {}", entry.summary());
                    return Ok(entry);
                }
                Err(e) if e.is_retryable() && attempt < self.max_append_retries => {
                    attempt += 1;
                    warn!(
                        "Append race on sequence {} (attempt {} of {}), retrying: {}",
                        entry.sequence_number, attempt, self.max_append_retries, e
                    );
                }
                Err(LedgerError::AppendConflict(msg)) => {
                    return Err(LedgerError::LedgerUnavailable(format!(
                        "append retries exhausted after {} attempts: {}",
                        attempt + 1,
                        msg
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Steps 1-6 of the append protocol: read the tail and derive the new
    /// entry from it. Commit (step 7) is the store's compare-and-append.
    async fn build_entry(
        &self,
        transaction_id: Uuid,
        content_root: &str,
        validator_id: Uuid,
    ) -> Result<LedgerEntry, LedgerError> {
        let tail = self.store.get_tail().await?;

        let (sequence_number, previous_hash, floor) = match &tail {
            Some(t) => (
                t.sequence_number + 1,
                t.entry_hash.clone(),
                Some(t.created_at),
            ),
            None => (1, GENESIS_PREVIOUS_HASH.to_string(), None),
        };

        // Microsecond precision so the stored value re-hashes identically;
        // clamped to the tail's timestamp to keep created_at non-decreasing
        let mut created_at = Utc::now().trunc_subsecs(6);
        if let Some(floor) = floor {
            created_at = created_at.max(floor);
        }

        let nonce = 0;
        let entry_hash =
            LedgerEntry::compute_entry_hash(&previous_hash, content_root, created_at, nonce);

        Ok(LedgerEntry {
            entry_id: Uuid::new_v4(),
            transaction_id,
            sequence_number,
            previous_hash,
            content_root: content_root.to_string(),
            entry_hash,
            created_at,
            nonce,
            difficulty: DEFAULT_DIFFICULTY,
            is_valid: true,
            validator_id,
        })
    }
}
