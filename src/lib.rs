pub mod config;
pub mod error;
pub mod fingerprint;
pub mod ledger;
pub mod store;

pub use error::LedgerError;
