//! Ledger Query Layer: read-only, parametrized queries over the external
//! append-only chain-indexer database.
//!
//! Nothing here mutates the ledger; the aggregator only reads transaction,
//! account, and action-receipt rows and materializes derived entities into
//! its own store.

pub mod client;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub use client::LedgerClient;
pub use types::{Account, AccountReceipt, Transaction, TransactionAction};

/// Simultaneous in-flight per-account sub-queries; caps connection-pool
/// pressure on the ledger database.
pub const FAN_OUT_CONCURRENCY: usize = 5;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DbError),

    #[error("Ledger error: {0}")]
    Other(String),
}

/// Read-only view of the external ledger, injected into the pipeline.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Transactions addressed to any of `account_ids` at or after the
    /// watermark, ascending by block timestamp. Passing `None` fetches
    /// from the beginning of the ledger (first run).
    async fn transactions_since(
        &self,
        account_ids: &[String],
        watermark: Option<u64>,
    ) -> Result<Vec<Transaction>, LedgerError>;

    /// Accounts created under the given parent contract, with their
    /// creation receipts. Child accounts share the parent's domain suffix
    /// (`alpha.factory.near` under `factory.near`).
    async fn accounts_by_contract_name(
        &self,
        contract_name: &str,
    ) -> Result<Vec<Account>, LedgerError>;
}

/// Run one sub-query per id with bounded concurrency, concatenating the
/// successes. A failure for one id is logged and isolated; it never aborts
/// the other sub-queries.
pub(crate) async fn fan_out<T, F, Fut>(ids: Vec<String>, limit: usize, query: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Vec<T>, LedgerError>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit));
    let query = Arc::new(query);
    let mut tasks: JoinSet<Result<Vec<T>, (String, LedgerError)>> = JoinSet::new();

    for id in ids {
        let semaphore = semaphore.clone();
        let query = query.clone();
        tasks.spawn(async move {
            // Semaphore is never closed, acquire cannot fail.
            let _permit = semaphore.acquire_owned().await;
            query(id.clone()).await.map_err(|e| (id, e))
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(rows)) => results.extend(rows),
            Ok(Err((id, e))) => {
                tracing::warn!("Ledger sub-query for {} failed: {}", id, e);
            }
            Err(e) => {
                tracing::warn!("Ledger sub-query task panicked: {}", e);
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn fan_out_isolates_per_id_failures() {
        let ids = vec!["a".to_string(), "bad".to_string(), "b".to_string()];

        let mut results = fan_out(ids, FAN_OUT_CONCURRENCY, |id| async move {
            if id == "bad" {
                Err(LedgerError::Other("boom".to_string()))
            } else {
                Ok(vec![format!("{}-row", id)])
            }
        })
        .await;

        results.sort();
        assert_eq!(results, vec!["a-row".to_string(), "b-row".to_string()]);
    }

    #[tokio::test]
    async fn fan_out_never_exceeds_the_concurrency_cap() {
        static IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);
        static PEAK: AtomicUsize = AtomicUsize::new(0);

        let ids: Vec<String> = (0..32).map(|i| i.to_string()).collect();

        fan_out(ids, FAN_OUT_CONCURRENCY, |_id| async move {
            let now = IN_FLIGHT.fetch_add(1, Ordering::SeqCst) + 1;
            PEAK.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            IN_FLIGHT.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![()])
        })
        .await;

        assert!(PEAK.load(Ordering::SeqCst) <= FAN_OUT_CONCURRENCY);
    }
}
