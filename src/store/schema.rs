// SQL schema for the append-only ledger table.

pub const LEDGER_SCHEMA: &str = include_str!("../../migrations/001_ledger_entries.sql");
