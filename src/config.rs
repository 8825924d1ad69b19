//! Service configuration, loaded from a JSON file with database URLs
//! resolved out of the environment.

use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

fn default_polling_interval_ms() -> u64 {
    // Five minutes, matching the ledger indexer's settlement lag.
    300_000
}

fn default_database_url_env_var() -> String {
    "DATABASE_URL".to_string()
}

fn default_ledger_database_url_env_var() -> String {
    "LEDGER_DATABASE_URL".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NearConfig {
    /// The DAO factory contract; every DAO is a child account of it.
    pub contract_name: String,
    pub token_factory_contract_name: String,
    pub bridge_token_factory_contract_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    pub near: NearConfig,

    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,

    /// Env var holding the materialized store connection string.
    #[serde(default = "default_database_url_env_var")]
    pub database_url_env_var: String,

    /// Env var holding the read-only ledger indexer connection string.
    #[serde(default = "default_ledger_database_url_env_var")]
    pub ledger_database_url_env_var: String,
}

impl AggregatorConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    /// Resolve the env vars the config names, loading `.env` when any are
    /// missing from the process environment.
    pub fn resolve_env_vars(&self) -> anyhow::Result<ResolvedUrls> {
        let required = [
            self.database_url_env_var.as_str(),
            self.ledger_database_url_env_var.as_str(),
        ];

        if required.iter().any(|var| env::var(var).is_err()) {
            // Missing vars may live in a .env file; absence of the file is
            // only fatal if the vars stay unresolved.
            let _ = dotenvy::dotenv();
        }

        let lookup = |var: &str| {
            env::var(var).with_context(|| format!("Required env var {} is not set", var))
        };

        Ok(ResolvedUrls {
            database_url: lookup(&self.database_url_env_var)?,
            ledger_database_url: lookup(&self.ledger_database_url_env_var)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedUrls {
    pub database_url: String,
    pub ledger_database_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config() {
        let config: AggregatorConfig = serde_json::from_str(
            r#"{
                "near": {
                    "contract_name": "sputnik-dao.near",
                    "token_factory_contract_name": "tkn.near",
                    "bridge_token_factory_contract_name": "factory.bridge.near"
                },
                "polling_interval_ms": 60000,
                "database_url_env_var": "AGGREGATOR_DB_URL",
                "ledger_database_url_env_var": "INDEXER_DB_URL"
            }"#,
        )
        .unwrap();

        assert_eq!(config.near.contract_name, "sputnik-dao.near");
        assert_eq!(config.polling_interval(), Duration::from_secs(60));
        assert_eq!(config.database_url_env_var, "AGGREGATOR_DB_URL");
    }

    #[test]
    fn omitted_fields_fall_back_to_defaults() {
        let config: AggregatorConfig = serde_json::from_str(
            r#"{
                "near": {
                    "contract_name": "sputnik-dao.near",
                    "token_factory_contract_name": "tkn.near",
                    "bridge_token_factory_contract_name": "factory.bridge.near"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.polling_interval(), Duration::from_secs(300));
        assert_eq!(config.database_url_env_var, "DATABASE_URL");
        assert_eq!(config.ledger_database_url_env_var, "LEDGER_DATABASE_URL");
    }
}
