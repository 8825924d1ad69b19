//! Reconciliation/Enrichment Engine: matches freshly fetched current-state
//! snapshots against the classified transaction history to recover the
//! provenance metadata the snapshots lack.
//!
//! Matching is always exact equality on every compared field at once.
//! Within the ascending-timestamp batch the first satisfying transaction
//! is the creation event and the last is the most recent update; a
//! snapshot with no match is passed through with null provenance rather
//! than dropped.

pub mod bounty;
pub mod dao;
pub mod proposal;
pub mod token;

pub use bounty::enrich_bounties;
pub use dao::enrich_daos;
pub use proposal::enrich_proposals;
pub use token::enrich_tokens;

use std::collections::HashMap;

use crate::ledger::Transaction;

/// Group a batch by receiver account id, preserving the batch's ascending
/// timestamp order within each group.
pub(crate) fn transactions_by_receiver(
    transactions: &[Transaction],
) -> HashMap<&str, Vec<&Transaction>> {
    let mut by_receiver: HashMap<&str, Vec<&Transaction>> = HashMap::new();
    for tx in transactions {
        by_receiver
            .entry(tx.receiver_account_id.as_str())
            .or_default()
            .push(tx);
    }
    by_receiver
}

/// Only rows with decodable JSON arguments participate in matching.
pub(crate) fn with_args<'a>(transactions: &[&'a Transaction]) -> Vec<&'a Transaction> {
    transactions
        .iter()
        .copied()
        .filter(|tx| tx.args().is_some())
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::ledger::{Transaction, TransactionAction};
    use serde_json::Value as JsonValue;

    pub fn tx(
        hash: &str,
        signer: &str,
        receiver: &str,
        timestamp: u64,
        method: &str,
        args: Option<JsonValue>,
    ) -> Transaction {
        Transaction {
            transaction_hash: hash.to_string(),
            signer_account_id: signer.to_string(),
            receiver_account_id: receiver.to_string(),
            block_timestamp: timestamp,
            action: TransactionAction {
                method_name: Some(method.to_string()),
                args_json: args,
            },
        }
    }
}
