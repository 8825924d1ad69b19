//! Materialized store boundary: idempotent persistence of enriched
//! entities and the raw transaction log the watermark is derived from.

pub mod sink;

pub use sink::MaterializedStore;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use thiserror::Error;

use crate::db::DbError;
use crate::ledger::Transaction;
use crate::model::{Bounty, Dao, Proposal, Token};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// The newest transaction the store has seen, used as the fetch watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRef {
    pub transaction_hash: String,
    pub block_timestamp: u64,
}

#[async_trait]
pub trait StoreSink: Send + Sync {
    /// The most recently persisted transaction, by block timestamp.
    /// `None` on a store that has never completed a run.
    async fn last_processed_transaction(&self) -> Result<Option<TransactionRef>, StoreError>;

    /// Distinct signer accounts per receiver over the persisted
    /// transaction log, for the given DAO ids.
    async fn signers_by_receiver(
        &self,
        dao_ids: &[String],
    ) -> Result<HashMap<String, HashSet<String>>, StoreError>;

    async fn upsert_dao(&self, dao: &Dao) -> Result<(), StoreError>;

    async fn upsert_proposal(&self, proposal: &Proposal) -> Result<(), StoreError>;

    /// Upserts the bounty row and all of its claim rows in one
    /// transaction.
    async fn upsert_bounty(&self, bounty: &Bounty) -> Result<(), StoreError>;

    async fn upsert_token(&self, token: &Token) -> Result<(), StoreError>;

    /// Appends the batch to the transaction log. Re-inserted hashes are
    /// ignored, so replays advance the watermark without duplicating rows.
    async fn record_transactions(&self, transactions: &[Transaction]) -> Result<(), StoreError>;
}
