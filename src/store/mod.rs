//! Ledger Store
//!
//! Append-only persistence of ledger entries, ordered by sequence number.
//! The store owns the append-tail: a UNIQUE constraint on `sequence_number`
//! gives compare-and-append semantics, rejecting the loser of a concurrent
//! append race so it can retry from the new tail. No update or delete of
//! ledger content is exposed; the single permitted write to existing rows
//! is the advisory `is_valid` cache refresh.

pub mod schema;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::entry::{LedgerEntry, DEFAULT_DIFFICULTY, GENESIS_PREVIOUS_HASH};

const SELECT_COLUMNS: &str = "entry_id, transaction_id, sequence_number, previous_hash, \
     content_root, entry_hash, created_at, nonce, difficulty, is_valid, validator_id";

#[derive(Clone)]
pub struct LedgerStore {
    pool: SqlitePool,
}

/// Raw row shape; UUIDs and timestamps are stored as TEXT so the hashed
/// representation round-trips byte for byte.
#[derive(sqlx::FromRow)]
struct EntryRow {
    entry_id: String,
    transaction_id: String,
    sequence_number: i64,
    previous_hash: String,
    content_root: String,
    entry_hash: String,
    created_at: String,
    nonce: i64,
    difficulty: i64,
    is_valid: bool,
    validator_id: String,
}

impl TryFrom<EntryRow> for LedgerEntry {
    type Error = LedgerError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let parse_uuid = |field: &str, value: &str| {
            Uuid::parse_str(value).map_err(|e| {
                LedgerError::CorruptRecord(format!("bad {} '{}': {}", field, value, e))
            })
        };

        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                LedgerError::CorruptRecord(format!("bad created_at '{}': {}", row.created_at, e))
            })?;

        Ok(LedgerEntry {
            entry_id: parse_uuid("entry_id", &row.entry_id)?,
            transaction_id: parse_uuid("transaction_id", &row.transaction_id)?,
            sequence_number: row.sequence_number,
            previous_hash: row.previous_hash,
            content_root: row.content_root,
            entry_hash: row.entry_hash,
            created_at,
            nonce: row.nonce,
            difficulty: row.difficulty,
            is_valid: row.is_valid,
            validator_id: parse_uuid("validator_id", &row.validator_id)?,
        })
    }
}

impl LedgerStore {
    /// Open (or create) a ledger database.
    ///
    /// The pool is capped at a single connection: the ledger has one
    /// writer authority, and this also keeps `sqlite::memory:` databases
    /// coherent across calls.
    pub async fn connect(database_url: &str) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(LedgerError::from)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(LedgerStore { pool })
    }

    /// In-memory store with migrations applied, for tests and tooling.
    pub async fn new_in_memory() -> Result<Self, LedgerError> {
        let store = Self::connect("sqlite::memory:").await?;
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn run_migrations(&self) -> Result<(), LedgerError> {
        sqlx::raw_sql(schema::LEDGER_SCHEMA)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The underlying pool, for read-only collaborators (the reporting
    /// API reads entries alongside transaction detail views).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Entry with the highest sequence number, or `None` for an empty
    /// ledger.
    pub async fn get_tail(&self) -> Result<Option<LedgerEntry>, LedgerError> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {} FROM ledger_entries ORDER BY sequence_number DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        row.map(LedgerEntry::try_from).transpose()
    }

    /// Compare-and-append: commits `entry` only if it still extends the
    /// current tail. A race on the sequence number is reported as
    /// `AppendConflict` so the builder can retry from step 1; a second
    /// entry for the same transaction is `DuplicateTransaction`.
    pub async fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let tail = self.get_tail().await?;
        let (expected_seq, expected_prev) = match &tail {
            Some(t) => (t.sequence_number + 1, t.entry_hash.as_str()),
            None => (1, GENESIS_PREVIOUS_HASH),
        };

        if entry.sequence_number != expected_seq || entry.previous_hash != expected_prev {
            return Err(LedgerError::AppendConflict(format!(
                "entry #{} no longer extends the tail (expected #{})",
                entry.sequence_number, expected_seq
            )));
        }

        let result = sqlx::query(
            "INSERT INTO ledger_entries \
             (entry_id, transaction_id, sequence_number, previous_hash, content_root, \
              entry_hash, created_at, nonce, difficulty, is_valid, validator_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(entry.entry_id.to_string())
        .bind(entry.transaction_id.to_string())
        .bind(entry.sequence_number)
        .bind(&entry.previous_hash)
        .bind(&entry.content_root)
        .bind(&entry.entry_hash)
        .bind(entry.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(entry.nonce)
        .bind(entry.difficulty)
        .bind(entry.is_valid)
        .bind(entry.validator_id.to_string())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!("Appended ledger entry {}", entry.summary());
                Ok(())
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                if db.message().contains("transaction_id") {
                    Err(LedgerError::DuplicateTransaction(entry.transaction_id))
                } else {
                    Err(LedgerError::AppendConflict(format!(
                        "sequence number {} was taken by a concurrent append",
                        entry.sequence_number
                    )))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All entries ordered strictly by ascending sequence number.
    pub async fn scan_ascending(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {} FROM ledger_entries ORDER BY sequence_number ASC",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    /// Entries within an inclusive sequence-number range, ascending.
    pub async fn scan_range(
        &self,
        from_sequence: i64,
        to_sequence: i64,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {} FROM ledger_entries \
             WHERE sequence_number BETWEEN ?1 AND ?2 ORDER BY sequence_number ASC",
            SELECT_COLUMNS
        ))
        .bind(from_sequence)
        .bind(to_sequence)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    /// Unique lookup by transaction id.
    pub async fn find_by_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<LedgerEntry>, LedgerError> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {} FROM ledger_entries WHERE transaction_id = ?1",
            SELECT_COLUMNS
        ))
        .bind(transaction_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(LedgerEntry::try_from).transpose()
    }

    pub async fn count_entries(&self) -> Result<i64, LedgerError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ledger_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Refresh the advisory `is_valid` cache from a verification pass.
    ///
    /// `first_break == None` marks every entry valid; otherwise entries
    /// from the break point onward are marked invalid. Touches nothing
    /// that participates in hashing, so subsequent verification runs are
    /// unaffected.
    pub async fn refresh_validity(&self, first_break: Option<i64>) -> Result<(), LedgerError> {
        match first_break {
            None => {
                sqlx::query("UPDATE ledger_entries SET is_valid = 1")
                    .execute(&self.pool)
                    .await?;
            }
            Some(break_seq) => {
                sqlx::query("UPDATE ledger_entries SET is_valid = (sequence_number < ?1)")
                    .bind(break_seq)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::sha256_hex;
    use chrono::SubsecRound;

    fn make_entry(sequence_number: i64, previous_hash: &str) -> LedgerEntry {
        // Microsecond precision, matching what storage round-trips
        let created_at = Utc::now().trunc_subsecs(6);
        let content_root = sha256_hex(format!("content-{}", sequence_number).as_bytes());
        let entry_hash =
            LedgerEntry::compute_entry_hash(previous_hash, &content_root, created_at, 0);

        LedgerEntry {
            entry_id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
            sequence_number,
            previous_hash: previous_hash.to_string(),
            content_root,
            entry_hash,
            created_at,
            nonce: 0,
            difficulty: DEFAULT_DIFFICULTY,
            is_valid: true,
            validator_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = LedgerStore::new_in_memory().await.unwrap();
        assert!(store.get_tail().await.unwrap().is_none());
        assert_eq!(store.count_entries().await.unwrap(), 0);
        assert!(store.scan_ascending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_and_tail() {
        let store = LedgerStore::new_in_memory().await.unwrap();

        let first = make_entry(1, GENESIS_PREVIOUS_HASH);
        store.append(&first).await.unwrap();

        let second = make_entry(2, &first.entry_hash);
        store.append(&second).await.unwrap();

        let tail = store.get_tail().await.unwrap().unwrap();
        assert_eq!(tail.sequence_number, 2);
        assert_eq!(tail.entry_hash, second.entry_hash);
        assert_eq!(tail.created_at, second.created_at);
    }

    #[tokio::test]
    async fn test_vestigial_fields_round_trip() {
        let store = LedgerStore::new_in_memory().await.unwrap();

        let mut entry = make_entry(1, GENESIS_PREVIOUS_HASH);
        entry.difficulty = 7;
        store.append(&entry).await.unwrap();

        let stored = store.get_tail().await.unwrap().unwrap();
        assert_eq!(stored.nonce, 0);
        assert_eq!(stored.difficulty, 7);
        // Neither field enters the hash
        assert!(stored.verify_hash());
    }

    #[tokio::test]
    async fn test_append_rejects_stale_tail() {
        let store = LedgerStore::new_in_memory().await.unwrap();

        let first = make_entry(1, GENESIS_PREVIOUS_HASH);
        store.append(&first).await.unwrap();

        // Built against an empty store, now stale
        let stale = make_entry(1, GENESIS_PREVIOUS_HASH);
        match store.append(&stale).await {
            Err(LedgerError::AppendConflict(_)) => {}
            other => panic!("expected AppendConflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_append_rejects_duplicate_transaction() {
        let store = LedgerStore::new_in_memory().await.unwrap();

        let first = make_entry(1, GENESIS_PREVIOUS_HASH);
        store.append(&first).await.unwrap();

        let mut dup = make_entry(2, &first.entry_hash);
        dup.transaction_id = first.transaction_id;
        match store.append(&dup).await {
            Err(LedgerError::DuplicateTransaction(id)) => {
                assert_eq!(id, first.transaction_id)
            }
            other => panic!("expected DuplicateTransaction, got {:?}", other),
        }
        assert_eq!(store.count_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_by_transaction() {
        let store = LedgerStore::new_in_memory().await.unwrap();

        let entry = make_entry(1, GENESIS_PREVIOUS_HASH);
        store.append(&entry).await.unwrap();

        let found = store
            .find_by_transaction(entry.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.entry_id, entry.entry_id);

        assert!(store
            .find_by_transaction(Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_scan_range() {
        let store = LedgerStore::new_in_memory().await.unwrap();

        let mut prev = GENESIS_PREVIOUS_HASH.to_string();
        for seq in 1..=5 {
            let entry = make_entry(seq, &prev);
            store.append(&entry).await.unwrap();
            prev = entry.entry_hash;
        }

        let slice = store.scan_range(2, 4).await.unwrap();
        let sequences: Vec<i64> = slice.iter().map(|e| e.sequence_number).collect();
        assert_eq!(sequences, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_refresh_validity() {
        let store = LedgerStore::new_in_memory().await.unwrap();

        let mut prev = GENESIS_PREVIOUS_HASH.to_string();
        for seq in 1..=3 {
            let entry = make_entry(seq, &prev);
            store.append(&entry).await.unwrap();
            prev = entry.entry_hash;
        }

        store.refresh_validity(Some(2)).await.unwrap();
        let entries = store.scan_ascending().await.unwrap();
        assert!(entries[0].is_valid);
        assert!(!entries[1].is_valid);
        assert!(!entries[2].is_valid);

        store.refresh_validity(None).await.unwrap();
        let entries = store.scan_ascending().await.unwrap();
        assert!(entries.iter().all(|e| e.is_valid));
    }
}
