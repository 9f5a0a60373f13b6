use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub database_url: String,
    pub max_append_retries: u32,
}

impl LedgerConfig {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let database_url = env::var("LEDGER_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://ledger.db".to_string());

        let max_append_retries = env::var("LEDGER_MAX_APPEND_RETRIES")
            .unwrap_or_else(|_| "3".to_string())
            .parse()?;

        Ok(LedgerConfig {
            database_url,
            max_append_retries,
        })
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            database_url: "sqlite://ledger.db".to_string(),
            max_append_retries: 3,
        }
    }
}
