use std::{env, time::Duration};

use anyhow::Context;

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 250;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Upper bound on the time an operation waits for all of its account
    /// locks before giving up with a transient failure.
    pub lock_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let lock_timeout = match lookup("LEDGER_LOCK_TIMEOUT_MS") {
            Some(raw) => {
                let millis: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid LEDGER_LOCK_TIMEOUT_MS `{raw}`"))?;
                if millis == 0 {
                    anyhow::bail!("LEDGER_LOCK_TIMEOUT_MS must be greater than zero");
                }
                Duration::from_millis(millis)
            }
            None => Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        };
        Ok(Self { lock_timeout })
    }
}
