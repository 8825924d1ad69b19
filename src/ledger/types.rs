use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A transaction row from the external chain indexer, with its function
/// call action joined in. Immutable once written; ordered by block
/// timestamp, tie-broken by hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_hash: String,
    pub signer_account_id: String,
    pub receiver_account_id: String,
    /// Block timestamp in nanoseconds.
    pub block_timestamp: u64,
    pub action: TransactionAction,
}

impl Transaction {
    pub fn method_name(&self) -> Option<&str> {
        self.action.method_name.as_deref()
    }

    /// Decoded JSON call arguments, `None` when the indexer could not
    /// decode them. Rows without decodable arguments are excluded from
    /// classification and matching.
    pub fn args(&self) -> Option<&JsonValue> {
        self.action.args_json.as_ref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionAction {
    pub method_name: Option<String>,
    pub args_json: Option<JsonValue>,
}

/// An account row with its creation receipt, the provenance source for
/// DAO creation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub receipt: Option<AccountReceipt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountReceipt {
    pub originated_from_transaction_hash: String,
    /// Nanosecond timestamp of the receipt's block inclusion.
    pub included_in_block_timestamp: u64,
    /// Signer of the originating transaction, when the indexer has it.
    pub signer_account_id: Option<String>,
}
