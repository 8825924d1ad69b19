//! Postgres implementation of the store boundary.
//!
//! Every write is an upsert keyed on the entity's deterministic id, so a
//! replayed batch converges to the same rows. The merge strategy per
//! column encodes the provenance contract: create provenance is frozen
//! after the first write, current-state fields always take the incoming
//! value, and the member count only ever grows.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::db::{DbOperation, DbPool, DbValue, MergeColumn};
use crate::ledger::Transaction;
use crate::model::{Bounty, Dao, Proposal, Token};

use super::{StoreError, StoreSink, TransactionRef};

pub struct MaterializedStore {
    pool: Arc<DbPool>,
}

impl MaterializedStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    fn dao_upsert(dao: &Dao) -> DbOperation {
        DbOperation::Upsert {
            table: "daos".to_string(),
            columns: cols(&[
                "id",
                "config",
                "policy",
                "staking_contract",
                "total_supply",
                "amount",
                "last_proposal_id",
                "last_bounty_id",
                "number_of_members",
                "status",
                "created_by",
                "transaction_hash",
                "create_timestamp",
                "update_transaction_hash",
                "update_timestamp",
            ]),
            values: vec![
                DbValue::Text(dao.id.clone()),
                DbValue::JsonB(dao.config.clone()),
                DbValue::JsonB(dao.policy.clone()),
                DbValue::opt_text(dao.staking_contract.as_deref()),
                opt_numeric(dao.total_supply.as_deref()),
                opt_numeric(dao.amount.as_deref()),
                DbValue::Uint64(dao.last_proposal_id),
                DbValue::Uint64(dao.last_bounty_id),
                DbValue::Int32(dao.number_of_members as i32),
                enum_text(&dao.status),
                DbValue::opt_text(dao.created_by.as_deref()),
                DbValue::opt_text(dao.provenance.transaction_hash.as_deref()),
                DbValue::opt_uint64(dao.provenance.create_timestamp),
                DbValue::opt_text(dao.provenance.update_transaction_hash.as_deref()),
                DbValue::opt_uint64(dao.provenance.update_timestamp),
            ],
            conflict_columns: cols(&["id"]),
            merge_columns: vec![
                MergeColumn::replace("config"),
                MergeColumn::replace("policy"),
                MergeColumn::replace("staking_contract"),
                MergeColumn::replace("total_supply"),
                MergeColumn::replace("amount"),
                MergeColumn::replace("last_proposal_id"),
                MergeColumn::replace("last_bounty_id"),
                MergeColumn::max("number_of_members"),
                MergeColumn::replace("status"),
                MergeColumn::set_once("created_by"),
                MergeColumn::set_once("transaction_hash"),
                MergeColumn::set_once("create_timestamp"),
                MergeColumn::replace("update_transaction_hash"),
                MergeColumn::replace("update_timestamp"),
            ],
        }
    }

    fn proposal_upsert(proposal: &Proposal) -> DbOperation {
        DbOperation::Upsert {
            table: "proposals".to_string(),
            columns: cols(&[
                "id",
                "proposal_id",
                "dao_id",
                "proposer",
                "description",
                "kind",
                "status",
                "submission_time",
                "vote_period_end",
                "votes",
                "transaction_hash",
                "create_timestamp",
                "update_transaction_hash",
                "update_timestamp",
            ]),
            values: vec![
                DbValue::Text(proposal.id.clone()),
                DbValue::Uint64(proposal.proposal_id),
                DbValue::Text(proposal.dao_id.clone()),
                DbValue::Text(proposal.proposer.clone()),
                DbValue::Text(proposal.description.clone()),
                DbValue::jsonb(&proposal.kind),
                enum_text(&proposal.status),
                DbValue::opt_uint64(proposal.submission_time),
                DbValue::opt_uint64(proposal.vote_period_end),
                DbValue::JsonB(proposal.votes.clone()),
                DbValue::opt_text(proposal.provenance.transaction_hash.as_deref()),
                DbValue::opt_uint64(proposal.provenance.create_timestamp),
                DbValue::opt_text(proposal.provenance.update_transaction_hash.as_deref()),
                DbValue::opt_uint64(proposal.provenance.update_timestamp),
            ],
            conflict_columns: cols(&["id"]),
            merge_columns: vec![
                MergeColumn::replace("status"),
                MergeColumn::replace("submission_time"),
                MergeColumn::replace("vote_period_end"),
                MergeColumn::replace("votes"),
                MergeColumn::set_once("transaction_hash"),
                MergeColumn::set_once("create_timestamp"),
                MergeColumn::replace("update_transaction_hash"),
                MergeColumn::replace("update_timestamp"),
            ],
        }
    }

    fn bounty_upserts(bounty: &Bounty) -> Vec<DbOperation> {
        let mut ops = vec![DbOperation::Upsert {
            table: "bounties".to_string(),
            columns: cols(&[
                "id",
                "bounty_id",
                "dao_id",
                "description",
                "token",
                "amount",
                "times",
                "max_deadline",
                "transaction_hash",
                "create_timestamp",
                "update_transaction_hash",
                "update_timestamp",
            ]),
            values: vec![
                DbValue::Text(bounty.id.clone()),
                DbValue::Uint64(bounty.bounty_id),
                DbValue::Text(bounty.dao_id.clone()),
                DbValue::Text(bounty.description.clone()),
                DbValue::Text(bounty.token.clone()),
                DbValue::Numeric(bounty.amount.clone()),
                DbValue::Int32(bounty.times as i32),
                DbValue::Numeric(bounty.max_deadline.clone()),
                DbValue::opt_text(bounty.provenance.transaction_hash.as_deref()),
                DbValue::opt_uint64(bounty.provenance.create_timestamp),
                DbValue::opt_text(bounty.provenance.update_transaction_hash.as_deref()),
                DbValue::opt_uint64(bounty.provenance.update_timestamp),
            ],
            conflict_columns: cols(&["id"]),
            merge_columns: vec![
                MergeColumn::replace("description"),
                MergeColumn::replace("token"),
                MergeColumn::replace("amount"),
                MergeColumn::replace("times"),
                MergeColumn::replace("max_deadline"),
                MergeColumn::set_once("transaction_hash"),
                MergeColumn::set_once("create_timestamp"),
                MergeColumn::replace("update_transaction_hash"),
                MergeColumn::replace("update_timestamp"),
            ],
        }];

        for claim in &bounty.claims {
            ops.push(DbOperation::Upsert {
                table: "bounty_claims".to_string(),
                columns: cols(&[
                    "id",
                    "bounty_row_id",
                    "account_id",
                    "start_time",
                    "deadline",
                    "completed",
                    "end_time",
                    "transaction_hash",
                    "create_timestamp",
                ]),
                values: vec![
                    DbValue::Text(claim.id.clone()),
                    DbValue::Text(bounty.id.clone()),
                    DbValue::Text(claim.account_id.clone()),
                    DbValue::Numeric(claim.start_time.clone()),
                    DbValue::Numeric(claim.deadline.clone()),
                    DbValue::Bool(claim.completed),
                    opt_numeric(claim.end_time.as_deref()),
                    DbValue::opt_text(claim.transaction_hash.as_deref()),
                    DbValue::opt_uint64(claim.create_timestamp),
                ],
                conflict_columns: cols(&["id"]),
                merge_columns: vec![
                    MergeColumn::replace("completed"),
                    MergeColumn::replace("end_time"),
                    MergeColumn::set_once("transaction_hash"),
                    MergeColumn::set_once("create_timestamp"),
                ],
            });
        }

        ops
    }

    fn token_upsert(token: &Token) -> DbOperation {
        DbOperation::Upsert {
            table: "tokens".to_string(),
            columns: cols(&[
                "id",
                "owner_id",
                "total_supply",
                "symbol",
                "name",
                "decimals",
                "icon",
                "transaction_hash",
                "create_timestamp",
            ]),
            values: vec![
                DbValue::Text(token.id.clone()),
                DbValue::opt_text(token.owner_id.as_deref()),
                opt_numeric(token.total_supply.as_deref()),
                DbValue::Text(token.metadata.symbol.clone()),
                DbValue::opt_text(token.metadata.name.as_deref()),
                token
                    .metadata
                    .decimals
                    .map_or(DbValue::Null, |d| DbValue::Int32(d as i32)),
                DbValue::opt_text(token.metadata.icon.as_deref()),
                DbValue::opt_text(token.transaction_hash.as_deref()),
                DbValue::opt_uint64(token.create_timestamp),
            ],
            conflict_columns: cols(&["id"]),
            merge_columns: vec![
                MergeColumn::replace("owner_id"),
                MergeColumn::replace("total_supply"),
                MergeColumn::replace("name"),
                MergeColumn::replace("decimals"),
                MergeColumn::replace("icon"),
                MergeColumn::set_once("transaction_hash"),
                MergeColumn::set_once("create_timestamp"),
            ],
        }
    }

    fn transaction_insert(tx: &Transaction) -> DbOperation {
        DbOperation::Upsert {
            table: "transactions".to_string(),
            columns: cols(&[
                "transaction_hash",
                "signer_account_id",
                "receiver_account_id",
                "block_timestamp",
                "method_name",
                "args",
            ]),
            values: vec![
                DbValue::Text(tx.transaction_hash.clone()),
                DbValue::Text(tx.signer_account_id.clone()),
                DbValue::Text(tx.receiver_account_id.clone()),
                DbValue::Uint64(tx.block_timestamp),
                DbValue::opt_text(tx.method_name()),
                tx.args().cloned().map_or(DbValue::Null, DbValue::JsonB),
            ],
            conflict_columns: cols(&["transaction_hash"]),
            merge_columns: Vec::new(),
        }
    }
}

#[async_trait]
impl StoreSink for MaterializedStore {
    async fn last_processed_transaction(&self) -> Result<Option<TransactionRef>, StoreError> {
        let row = self
            .pool
            .query_opt(
                "SELECT transaction_hash, block_timestamp
                 FROM transactions
                 ORDER BY block_timestamp DESC
                 LIMIT 1",
                &[],
            )
            .await?;

        Ok(row.map(|r| TransactionRef {
            transaction_hash: r.get::<_, String>(0),
            block_timestamp: r.get::<_, i64>(1) as u64,
        }))
    }

    async fn signers_by_receiver(
        &self,
        dao_ids: &[String],
    ) -> Result<HashMap<String, HashSet<String>>, StoreError> {
        if dao_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = self
            .pool
            .query(
                "SELECT DISTINCT receiver_account_id, signer_account_id
                 FROM transactions
                 WHERE receiver_account_id = ANY($1)",
                &[&dao_ids],
            )
            .await?;

        let mut signers: HashMap<String, HashSet<String>> = HashMap::new();
        for row in rows {
            signers
                .entry(row.get::<_, String>(0))
                .or_default()
                .insert(row.get::<_, String>(1));
        }
        Ok(signers)
    }

    async fn upsert_dao(&self, dao: &Dao) -> Result<(), StoreError> {
        self.pool
            .execute_transaction(vec![Self::dao_upsert(dao)])
            .await?;
        Ok(())
    }

    async fn upsert_proposal(&self, proposal: &Proposal) -> Result<(), StoreError> {
        self.pool
            .execute_transaction(vec![Self::proposal_upsert(proposal)])
            .await?;
        Ok(())
    }

    async fn upsert_bounty(&self, bounty: &Bounty) -> Result<(), StoreError> {
        self.pool
            .execute_transaction(Self::bounty_upserts(bounty))
            .await?;
        Ok(())
    }

    async fn upsert_token(&self, token: &Token) -> Result<(), StoreError> {
        self.pool
            .execute_transaction(vec![Self::token_upsert(token)])
            .await?;
        Ok(())
    }

    async fn record_transactions(&self, transactions: &[Transaction]) -> Result<(), StoreError> {
        let ops = transactions.iter().map(Self::transaction_insert).collect();
        self.pool.execute_transaction(ops).await?;
        Ok(())
    }
}

fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn opt_numeric(value: Option<&str>) -> DbValue {
    value.map_or(DbValue::Null, |v| DbValue::Numeric(v.to_string()))
}

/// A unit enum variant as its serialized name, for TEXT status columns.
fn enum_text<T: Serialize>(value: &T) -> DbValue {
    match serde_json::to_value(value) {
        Ok(JsonValue::String(s)) => DbValue::Text(s),
        _ => DbValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DaoStatus, ProposalStatus};

    #[test]
    fn enum_text_uses_the_serialized_variant_name() {
        assert_eq!(
            enum_text(&Some(DaoStatus::Active)),
            DbValue::Text("Active".to_string())
        );
        assert_eq!(
            enum_text(&ProposalStatus::InProgress),
            DbValue::Text("InProgress".to_string())
        );
        assert_eq!(enum_text(&Option::<DaoStatus>::None), DbValue::Null);
    }

    #[test]
    fn transaction_rows_never_merge_on_conflict() {
        let tx = Transaction {
            transaction_hash: "t1".to_string(),
            signer_account_id: "alice.near".to_string(),
            receiver_account_id: "alpha.factory.near".to_string(),
            block_timestamp: 150,
            action: Default::default(),
        };

        let DbOperation::Upsert { merge_columns, .. } = MaterializedStore::transaction_insert(&tx);
        assert!(merge_columns.is_empty());
    }

    #[test]
    fn dao_create_provenance_is_frozen_and_member_count_monotonic() {
        let dao = Dao {
            id: "alpha.factory.near".to_string(),
            config: serde_json::json!({}),
            policy: serde_json::json!({}),
            staking_contract: None,
            total_supply: None,
            amount: None,
            last_proposal_id: 0,
            last_bounty_id: 0,
            number_of_members: 2,
            status: Some(DaoStatus::Active),
            created_by: None,
            provenance: Default::default(),
        };

        let DbOperation::Upsert { merge_columns, .. } = MaterializedStore::dao_upsert(&dao);
        let strategy = |name: &str| {
            merge_columns
                .iter()
                .find(|mc| mc.name == name)
                .map(|mc| mc.strategy)
        };

        use crate::db::MergeStrategy;
        assert_eq!(strategy("transaction_hash"), Some(MergeStrategy::SetOnce));
        assert_eq!(strategy("create_timestamp"), Some(MergeStrategy::SetOnce));
        assert_eq!(strategy("created_by"), Some(MergeStrategy::SetOnce));
        assert_eq!(strategy("number_of_members"), Some(MergeStrategy::Max));
        assert_eq!(
            strategy("update_transaction_hash"),
            Some(MergeStrategy::Replace)
        );
    }
}
