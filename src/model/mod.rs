//! Materialized domain entities owned by the aggregator.
//!
//! Everything in this module is read-write state derived from the ledger:
//! the external chain indexer owns the raw transaction rows, this module
//! owns the enriched entities built from them.

pub mod bounty;
pub mod dao;
pub mod ids;
pub mod proposal;
pub mod token;

pub use bounty::{Bounty, BountyClaim, BountyPayload};
pub use dao::{Dao, DaoStatus};
pub use ids::{build_bounty_claim_id, build_bounty_id, build_dao_id, build_proposal_id};
pub use proposal::{Proposal, ProposalKind, ProposalStatus};
pub use token::{Token, TokenMetadata};

use serde::{Deserialize, Serialize};

/// Create/update transaction provenance attached to a materialized entity.
///
/// Create fields are set at most once, on the first successful match;
/// update fields always carry the most recent matching transaction. An
/// entity with no matching transaction keeps all four fields `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub transaction_hash: Option<String>,
    pub create_timestamp: Option<u64>,
    pub update_transaction_hash: Option<String>,
    pub update_timestamp: Option<u64>,
}

impl Provenance {
    pub fn set_create(&mut self, transaction_hash: &str, block_timestamp: u64) {
        self.transaction_hash = Some(transaction_hash.to_string());
        self.create_timestamp = Some(block_timestamp);
    }

    pub fn set_update(&mut self, transaction_hash: &str, block_timestamp: u64) {
        self.update_transaction_hash = Some(transaction_hash.to_string());
        self.update_timestamp = Some(block_timestamp);
    }
}
