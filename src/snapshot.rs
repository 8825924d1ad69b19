//! Snapshot Fetcher boundary: the on-chain view-call source that returns
//! an entity's present field values as of the latest block.
//!
//! The aggregator treats this as an opaque read function; implementations
//! live in the surrounding service.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Bounty, Dao, Proposal, Token};

#[derive(Debug, Error)]
#[error("Snapshot source error: {0}")]
pub struct SnapshotError(pub String);

impl SnapshotError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// All DAO account ids known to the factory.
    async fn dao_ids(&self) -> Result<Vec<String>, SnapshotError>;

    async fn get_current_daos(&self, ids: &[String]) -> Result<Vec<Dao>, SnapshotError>;

    async fn get_current_proposals(
        &self,
        dao_ids: &[String],
    ) -> Result<Vec<Proposal>, SnapshotError>;

    /// Bounties for the given DAOs, with claims restricted to the
    /// candidate claimant accounts.
    async fn get_current_bounties(
        &self,
        dao_ids: &[String],
        claimant_ids: &[String],
    ) -> Result<Vec<Bounty>, SnapshotError>;

    /// `None` fetches the full token list (bootstrap); an empty slice
    /// means no new token activity and yields nothing.
    async fn get_current_tokens(
        &self,
        symbols: Option<&[String]>,
    ) -> Result<Vec<Token>, SnapshotError>;
}
