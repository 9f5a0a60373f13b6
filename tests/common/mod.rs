use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use transparency_ledger::fingerprint::TransactionFields;
use transparency_ledger::ledger::ChainEntryBuilder;
use transparency_ledger::store::LedgerStore;

/// Set up an in-memory SQLite ledger store for testing
pub async fn setup_test_store() -> LedgerStore {
    LedgerStore::new_in_memory()
        .await
        .expect("Failed to create test ledger store")
}

/// Builder over a fresh in-memory store
pub async fn setup_test_builder() -> ChainEntryBuilder {
    ChainEntryBuilder::new(setup_test_store().await)
}

/// Canonical fields for a test transaction
pub fn test_fields(amount: &str) -> TransactionFields {
    TransactionFields {
        amount: Some(amount.parse::<Decimal>().expect("bad test amount")),
        description: Some("Quarterly vendor settlement".to_string()),
        transaction_date: Some(Utc.with_ymd_and_hms(2024, 7, 1, 14, 0, 0).unwrap()),
        approved_by: Some(Uuid::new_v4()),
    }
}
