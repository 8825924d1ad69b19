//! Event Classifier: partitions a batch of new ledger transactions into
//! the domain-relevant candidate sets by receiver account, method name,
//! and decoded JSON arguments.
//!
//! Rows whose arguments did not decode as JSON are skipped silently; a
//! malformed payload never fails the batch.

use std::collections::HashSet;

use crate::ledger::Transaction;
use crate::model::build_dao_id;

pub const METHOD_CREATE_DAO: &str = "create";
pub const METHOD_ADD_PROPOSAL: &str = "add_proposal";
pub const METHOD_BOUNTY_CLAIM: &str = "bounty_claim";
pub const METHOD_CREATE_TOKEN: &str = "create_token";

/// The four candidate sets derived from one batch. Each preserves first
/// encounter order and holds no duplicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedBatch {
    /// DAOs created through the factory in this batch.
    pub new_dao_ids: Vec<String>,
    /// DAOs touched by proposal-mutating calls (any method carrying a
    /// proposal sequence id).
    pub touched_dao_ids: Vec<String>,
    /// Signer accounts of `bounty_claim` calls, the candidate active
    /// claimants.
    pub bounty_claim_signers: Vec<String>,
    /// Symbols of tokens created through the token factory.
    pub new_token_symbols: Vec<String>,
}

impl ClassifiedBatch {
    pub fn is_empty(&self) -> bool {
        self.new_dao_ids.is_empty()
            && self.touched_dao_ids.is_empty()
            && self.bounty_claim_signers.is_empty()
            && self.new_token_symbols.is_empty()
    }
}

pub fn classify(
    transactions: &[Transaction],
    dao_factory: &str,
    token_factory: &str,
) -> ClassifiedBatch {
    let mut batch = ClassifiedBatch::default();
    let mut seen_daos = HashSet::new();
    let mut seen_touched = HashSet::new();
    let mut seen_signers = HashSet::new();
    let mut seen_symbols = HashSet::new();

    for tx in transactions {
        let Some(args) = tx.args() else {
            continue;
        };
        let method = tx.method_name().unwrap_or_default();

        if tx.receiver_account_id == dao_factory && method == METHOD_CREATE_DAO {
            if let Some(name) = args.get("name").and_then(|v| v.as_str()) {
                let dao_id = build_dao_id(name, dao_factory);
                if seen_daos.insert(dao_id.clone()) {
                    batch.new_dao_ids.push(dao_id);
                }
            }
        }

        if tx.receiver_account_id != dao_factory
            && args.get("id").and_then(|v| v.as_u64()).is_some()
            && seen_touched.insert(tx.receiver_account_id.clone())
        {
            batch.touched_dao_ids.push(tx.receiver_account_id.clone());
        }

        if method == METHOD_BOUNTY_CLAIM && seen_signers.insert(tx.signer_account_id.clone()) {
            batch
                .bounty_claim_signers
                .push(tx.signer_account_id.clone());
        }

        if tx.receiver_account_id == token_factory && method == METHOD_CREATE_TOKEN {
            let symbol = args
                .pointer("/args/metadata/symbol")
                .and_then(|v| v.as_str());
            if let Some(symbol) = symbol {
                if seen_symbols.insert(symbol.to_string()) {
                    batch.new_token_symbols.push(symbol.to_string());
                }
            }
        }
    }

    batch
}
