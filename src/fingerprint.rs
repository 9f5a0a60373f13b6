//! Fingerprint Engine
//!
//! Deterministic hashing of a transaction's canonical fields into a
//! content fingerprint. The same input bytes produce the same digest on
//! any platform; a partial record is rejected, never hashed.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::LedgerError;

/// Canonical fields of a finalized transaction, as handed over by the
/// external transaction workflow.
///
/// Fields are optional at the type level because presence is validated
/// here: `amount`, `description`, and `transaction_date` are required,
/// `approved_by` may legitimately be absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionFields {
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
}

/// Create the canonical string representation for hashing.
///
/// Fixed field order, labeled pipe-separated segments. Amounts are
/// normalized (no trailing zeros, no locale formatting) and timestamps
/// rendered as RFC 3339 UTC with microsecond precision, so byte layout
/// cannot vary between runs. An absent `approved_by` serializes as an
/// empty value after its label rather than being omitted.
pub fn canonical_string(
    transaction_id: Uuid,
    fields: &TransactionFields,
) -> Result<String, LedgerError> {
    let amount = fields
        .amount
        .ok_or(LedgerError::MissingField("amount"))?;
    let description = fields
        .description
        .as_deref()
        .ok_or(LedgerError::MissingField("description"))?;
    let transaction_date = fields
        .transaction_date
        .ok_or(LedgerError::MissingField("transaction_date"))?;

    let approved_by = fields
        .approved_by
        .map(|id| id.to_string())
        .unwrap_or_default();

    Ok(format!(
        "id:{}|amount:{}|description:{}|transaction_date:{}|approved_by:{}",
        transaction_id,
        amount.normalize(),
        description,
        transaction_date.to_rfc3339_opts(SecondsFormat::Micros, true),
        approved_by
    ))
}

/// SHA-256 digest of the canonical field string, hex encoded.
pub fn leaf_fingerprint(
    transaction_id: Uuid,
    fields: &TransactionFields,
) -> Result<String, LedgerError> {
    let canonical = canonical_string(transaction_id, fields)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// Content root over the transaction's canonical fields.
///
/// A degenerate single-leaf Merkle root: the hash of the leaf
/// fingerprint's hex form. One entry covers exactly one transaction, so
/// the tree never grows past one leaf; the extra hashing level is kept
/// for compatibility with existing chains.
pub fn content_root(
    transaction_id: Uuid,
    fields: &TransactionFields,
) -> Result<String, LedgerError> {
    let leaf = leaf_fingerprint(transaction_id, fields)?;
    Ok(sha256_hex(leaf.as_bytes()))
}

/// SHA-256 digest of raw bytes, hex encoded.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
