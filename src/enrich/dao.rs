use std::collections::{HashMap, HashSet};

use crate::ledger::{Account, AccountReceipt, Transaction};
use crate::model::{Dao, DaoStatus};

use super::transactions_by_receiver;

/// Enrich DAO snapshots with creation and update provenance.
///
/// Creation provenance comes from the account-creation receipt of the
/// DAO's own account id, not from a transaction match; update provenance
/// is the last batch transaction addressed to the DAO, falling back to
/// the receipt data. The member count is the distinct-signer count over
/// the DAO's full history: signers already persisted in the store
/// (`prior_signers`) unioned with the batch signers.
pub fn enrich_daos(
    daos: Vec<Dao>,
    accounts: &[Account],
    transactions: &[Transaction],
    prior_signers: &HashMap<String, HashSet<String>>,
) -> Vec<Dao> {
    let receipts: HashMap<&str, &AccountReceipt> = accounts
        .iter()
        .filter_map(|a| a.receipt.as_ref().map(|r| (a.account_id.as_str(), r)))
        .collect();

    let by_receiver = transactions_by_receiver(transactions);

    daos.into_iter()
        .map(|mut dao| {
            let receipt = receipts.get(dao.id.as_str());
            let dao_txs = by_receiver.get(dao.id.as_str());

            if let Some(receipt) = receipt {
                dao.provenance.set_create(
                    &receipt.originated_from_transaction_hash,
                    receipt.included_in_block_timestamp,
                );
                dao.created_by = receipt.signer_account_id.clone();
            }

            match dao_txs.and_then(|txs| txs.last()) {
                Some(last) => {
                    dao.provenance
                        .set_update(&last.transaction_hash, last.block_timestamp);
                }
                None => {
                    if let Some(receipt) = receipt {
                        dao.provenance.set_update(
                            &receipt.originated_from_transaction_hash,
                            receipt.included_in_block_timestamp,
                        );
                    }
                }
            }

            let mut signers: HashSet<&str> = prior_signers
                .get(&dao.id)
                .map(|s| s.iter().map(String::as_str).collect())
                .unwrap_or_default();
            if let Some(txs) = dao_txs {
                signers.extend(txs.iter().map(|tx| tx.signer_account_id.as_str()));
            }
            dao.number_of_members = signers.len() as u32;

            dao.status = Some(DaoStatus::Active);
            dao
        })
        .collect()
}
