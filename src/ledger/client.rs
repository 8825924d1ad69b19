use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio_postgres::Row;

use crate::db::DbPool;

use super::types::{Account, AccountReceipt, Transaction, TransactionAction};
use super::{fan_out, LedgerError, LedgerSource, FAN_OUT_CONCURRENCY};

/// The ledger driver rejects oversized array parameters, so `IN`-style id
/// lists are chunked client-side.
const ACCOUNT_ID_CHUNK: usize = 500;

/// Postgres-backed ledger source reading the chain indexer's tables
/// (transactions, transaction_actions, accounts, receipts,
/// action_receipt_actions).
pub struct LedgerClient {
    pool: Arc<DbPool>,
    /// Well-known bridge contract whose `mint` calls indicate bridged
    /// token ownership; used by the likely-token heuristic.
    bridge_token_factory: String,
}

impl LedgerClient {
    pub fn new(pool: Arc<DbPool>, bridge_token_factory: impl Into<String>) -> Self {
        Self {
            pool,
            bridge_token_factory: bridge_token_factory.into(),
        }
    }

    async fn transactions_chunk(
        &self,
        account_ids: &[String],
        watermark: Option<u64>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let ids: Vec<String> = account_ids.to_vec();

        let rows = match watermark {
            Some(from) => {
                self.pool
                    .query(
                        "SELECT t.transaction_hash,
                                t.signer_account_id,
                                t.receiver_account_id,
                                t.block_timestamp::bigint AS block_timestamp,
                                ta.args ->> 'method_name' AS method_name,
                                ta.args -> 'args_json' AS args_json
                         FROM transactions t
                         LEFT JOIN transaction_actions ta
                                ON ta.transaction_hash = t.transaction_hash
                         WHERE t.receiver_account_id = ANY($1)
                           AND t.block_timestamp >= $2
                         ORDER BY t.block_timestamp ASC",
                        &[&ids, &(from as i64)],
                    )
                    .await?
            }
            None => {
                self.pool
                    .query(
                        "SELECT t.transaction_hash,
                                t.signer_account_id,
                                t.receiver_account_id,
                                t.block_timestamp::bigint AS block_timestamp,
                                ta.args ->> 'method_name' AS method_name,
                                ta.args -> 'args_json' AS args_json
                         FROM transactions t
                         LEFT JOIN transaction_actions ta
                                ON ta.transaction_hash = t.transaction_hash
                         WHERE t.receiver_account_id = ANY($1)
                         ORDER BY t.block_timestamp ASC",
                        &[&ids],
                    )
                    .await?
            }
        };

        Ok(rows.iter().map(transaction_from_row).collect())
    }

    /// Contracts that look like fungible tokens an account holds or has
    /// touched: direct transfer receivers, bridge mints addressed to the
    /// account, and `ft_*`/`storage_deposit` calls the account initiated.
    /// Best-effort: false negatives are acceptable, results are unioned
    /// and de-duplicated by contract id.
    pub async fn likely_tokens_for(&self, account_id: &str) -> Result<Vec<String>, LedgerError> {
        let received = async {
            self.pool
                .query(
                    "SELECT DISTINCT receipt_receiver_account_id
                     FROM action_receipt_actions
                     WHERE args -> 'args_json' ->> 'receiver_id' = $1
                       AND action_kind = 'FUNCTION_CALL'
                       AND args ->> 'args_json' IS NOT NULL
                       AND args ->> 'method_name' IN ('ft_transfer', 'ft_transfer_call', 'ft_mint')",
                    &[&account_id],
                )
                .await
        };

        let minted_with_bridge = async {
            self.pool
                .query(
                    "SELECT DISTINCT receipt_receiver_account_id FROM (
                         SELECT args -> 'args_json' ->> 'account_id' AS account_id,
                                receipt_receiver_account_id
                         FROM action_receipt_actions
                         WHERE action_kind = 'FUNCTION_CALL'
                           AND receipt_predecessor_account_id = $2
                           AND args ->> 'method_name' = 'mint'
                     ) minted_with_bridge
                     WHERE account_id = $1",
                    &[&account_id, &self.bridge_token_factory],
                )
                .await
        };

        let called_by_user = async {
            self.pool
                .query(
                    "SELECT DISTINCT receipt_receiver_account_id
                     FROM action_receipt_actions
                     WHERE receipt_predecessor_account_id = $1
                       AND action_kind = 'FUNCTION_CALL'
                       AND (args ->> 'method_name' LIKE 'ft_%'
                            OR args ->> 'method_name' = 'storage_deposit')",
                    &[&account_id],
                )
                .await
        };

        let (received, minted, called) =
            tokio::try_join!(received, minted_with_bridge, called_by_user)?;

        Ok(dedup_contract_ids(
            received.iter().chain(&minted).chain(&called),
        ))
    }

    /// Contracts that look like NFT collections the account has received
    /// tokens from. Same best-effort contract as [`likely_tokens_for`].
    pub async fn likely_nfts_for(&self, account_id: &str) -> Result<Vec<String>, LedgerError> {
        let rows = self
            .pool
            .query(
                "SELECT DISTINCT receipt_receiver_account_id
                 FROM action_receipt_actions
                 WHERE args -> 'args_json' ->> 'receiver_id' = $1
                   AND action_kind = 'FUNCTION_CALL'
                   AND args ->> 'args_json' IS NOT NULL
                   AND args ->> 'method_name' LIKE 'nft_%'",
                &[&account_id],
            )
            .await?;

        Ok(dedup_contract_ids(rows.iter()))
    }

    /// Likely-token discovery fanned out over many accounts with bounded
    /// concurrency; a failing account is dropped, not fatal.
    pub async fn likely_tokens_for_accounts(
        self: &Arc<Self>,
        account_ids: &[String],
    ) -> Vec<String> {
        let client = self.clone();
        let contract_ids = fan_out(
            account_ids.to_vec(),
            FAN_OUT_CONCURRENCY,
            move |account_id| {
                let client = client.clone();
                async move { client.likely_tokens_for(&account_id).await }
            },
        )
        .await;

        let mut seen = HashSet::new();
        contract_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }
}

#[async_trait]
impl LedgerSource for LedgerClient {
    async fn transactions_since(
        &self,
        account_ids: &[String],
        watermark: Option<u64>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let mut transactions = Vec::new();
        for chunk in chunk_ids(account_ids, ACCOUNT_ID_CHUNK) {
            transactions.extend(self.transactions_chunk(chunk, watermark).await?);
        }

        // Chunks come back individually ordered; restore global order.
        transactions.sort_by(|a, b| {
            a.block_timestamp
                .cmp(&b.block_timestamp)
                .then_with(|| a.transaction_hash.cmp(&b.transaction_hash))
        });

        Ok(transactions)
    }

    async fn accounts_by_contract_name(
        &self,
        contract_name: &str,
    ) -> Result<Vec<Account>, LedgerError> {
        // Child accounts live under the parent contract's domain, e.g.
        // alpha.factory.near under factory.near.
        let pattern = format!("%{}", contract_name);

        let rows = self
            .pool
            .query(
                "SELECT a.account_id,
                        r.originated_from_transaction_hash,
                        r.included_in_block_timestamp::bigint AS included_in_block_timestamp,
                        t.signer_account_id
                 FROM accounts a
                 LEFT JOIN receipts r ON r.receipt_id = a.created_by_receipt_id
                 LEFT JOIN transactions t
                        ON t.transaction_hash = r.originated_from_transaction_hash
                 WHERE a.account_id LIKE $1",
                &[&pattern],
            )
            .await?;

        Ok(rows.iter().map(account_from_row).collect())
    }
}

fn transaction_from_row(row: &Row) -> Transaction {
    let args_json: Option<JsonValue> = row.get("args_json");
    Transaction {
        transaction_hash: row.get("transaction_hash"),
        signer_account_id: row.get("signer_account_id"),
        receiver_account_id: row.get("receiver_account_id"),
        block_timestamp: row.get::<_, i64>("block_timestamp") as u64,
        action: TransactionAction {
            method_name: row.get("method_name"),
            args_json,
        },
    }
}

fn account_from_row(row: &Row) -> Account {
    let transaction_hash: Option<String> = row.get("originated_from_transaction_hash");
    let receipt = transaction_hash.map(|hash| AccountReceipt {
        originated_from_transaction_hash: hash,
        included_in_block_timestamp: row
            .get::<_, Option<i64>>("included_in_block_timestamp")
            .unwrap_or_default() as u64,
        signer_account_id: row.get("signer_account_id"),
    });

    Account {
        account_id: row.get("account_id"),
        receipt,
    }
}

fn dedup_contract_ids<'a>(rows: impl Iterator<Item = &'a Row>) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.map(|row| row.get::<_, String>(0))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

fn chunk_ids(ids: &[String], size: usize) -> impl Iterator<Item = &[String]> {
    ids.chunks(size.max(1))
}
