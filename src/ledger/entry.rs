//! Ledger Entry
//!
//! One immutable record linking a transaction's content fingerprint into
//! the hash chain.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::sha256_hex;

/// `previous_hash` of the first entry in a chain.
pub const GENESIS_PREVIOUS_HASH: &str = "";

/// Difficulty carried by every entry. Vestigial: no proof-of-work search
/// is performed and the value never enters any hash.
pub const DEFAULT_DIFFICULTY: i64 = 4;

/// An entry in the tamper-evident ledger. Created exactly once when its
/// transaction is finalized; never updated field by field except for the
/// advisory `is_valid` cache, and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: Uuid,
    /// Exactly one entry exists per transaction.
    pub transaction_id: Uuid,
    /// Dense, strictly increasing, starting at 1.
    pub sequence_number: i64,
    /// `entry_hash` of the predecessor, or [`GENESIS_PREVIOUS_HASH`] for
    /// the first entry.
    pub previous_hash: String,
    /// Single-leaf Merkle root over the transaction's canonical fields.
    pub content_root: String,
    /// Binds this entry to its predecessor and content.
    pub entry_hash: String,
    /// Assigned at append time; monotonic non-decreasing along the chain.
    /// Microsecond precision so the hashed representation round-trips
    /// through storage.
    pub created_at: DateTime<Utc>,
    /// Inert; no proof-of-work search is performed. Kept for chain-format
    /// compatibility.
    pub nonce: i64,
    /// Inert, like `nonce`; excluded from hashing. Kept for chain-format
    /// compatibility.
    pub difficulty: i64,
    /// Cache written by the most recent verification pass. Advisory only;
    /// the verifier is the source of truth.
    pub is_valid: bool,
    /// Principal that triggered the append.
    pub validator_id: Uuid,
}

impl LedgerEntry {
    /// Compute the entry hash binding `(previous_hash, content_root,
    /// created_at, nonce)`. A pure function: recomputing it for a
    /// non-tampered entry reproduces the stored value.
    pub fn compute_entry_hash(
        previous_hash: &str,
        content_root: &str,
        created_at: DateTime<Utc>,
        nonce: i64,
    ) -> String {
        let canonical = format!(
            "previous_hash:{}|content_root:{}|created_at:{}|nonce:{}",
            previous_hash,
            content_root,
            created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            nonce
        );
        sha256_hex(canonical.as_bytes())
    }

    /// Recompute this entry's hash and compare against the stored value.
    pub fn verify_hash(&self) -> bool {
        self.entry_hash
            == Self::compute_entry_hash(
                &self.previous_hash,
                &self.content_root,
                self.created_at,
                self.nonce,
            )
    }

    /// True for the first entry of a chain.
    pub fn is_genesis(&self) -> bool {
        self.sequence_number == 1
    }

    /// Human-readable one-liner for logs.
    pub fn summary(&self) -> String {
        format!(
            "#{} tx {} ({})",
            self.sequence_number, self.transaction_id, self.entry_hash
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_entry() -> LedgerEntry {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap();
        let content_root = sha256_hex(b"content");
        let entry_hash =
            LedgerEntry::compute_entry_hash(GENESIS_PREVIOUS_HASH, &content_root, created_at, 0);

        LedgerEntry {
            entry_id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
            sequence_number: 1,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            content_root,
            entry_hash,
            created_at,
            nonce: 0,
            difficulty: DEFAULT_DIFFICULTY,
            is_valid: true,
            validator_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_entry_hash_is_pure() {
        let entry = sample_entry();
        let recomputed = LedgerEntry::compute_entry_hash(
            &entry.previous_hash,
            &entry.content_root,
            entry.created_at,
            entry.nonce,
        );
        assert_eq!(entry.entry_hash, recomputed);
        assert!(entry.verify_hash());
    }

    #[test]
    fn test_verify_hash_detects_content_change() {
        let mut entry = sample_entry();
        entry.content_root = sha256_hex(b"tampered");
        assert!(!entry.verify_hash());
    }

    #[test]
    fn test_verify_hash_detects_timestamp_change() {
        let mut entry = sample_entry();
        entry.created_at = entry.created_at + chrono::Duration::seconds(1);
        assert!(!entry.verify_hash());
    }

    #[test]
    fn test_difficulty_is_inert() {
        let mut entry = sample_entry();
        entry.difficulty = 99;
        // Difficulty never enters the hash; the entry still verifies
        assert!(entry.verify_hash());
    }

    #[test]
    fn test_nonce_participates_in_hash() {
        let entry = sample_entry();
        let other = LedgerEntry::compute_entry_hash(
            &entry.previous_hash,
            &entry.content_root,
            entry.created_at,
            1,
        );
        assert_ne!(entry.entry_hash, other);
    }
}
