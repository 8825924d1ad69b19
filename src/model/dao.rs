use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::Provenance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaoStatus {
    Active,
    Inactive,
}

/// A DAO materialized from its on-chain snapshot plus ledger provenance.
///
/// `config` and `policy` are stored as the contract returns them; only the
/// fields the reconciliation logic needs are read back out (see
/// [`proposal_period`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dao {
    /// `{name}.{factory_contract_id}`, also the DAO's account id.
    pub id: String,
    pub config: JsonValue,
    pub policy: JsonValue,
    pub staking_contract: Option<String>,
    /// Total delegation supply, yocto amount as decimal string.
    pub total_supply: Option<String>,
    /// Account balance, yocto amount as decimal string.
    pub amount: Option<String>,
    pub last_proposal_id: u64,
    pub last_bounty_id: u64,
    /// Distinct signer accounts observed over the DAO's full transaction
    /// history. Monotonically non-decreasing.
    pub number_of_members: u32,
    pub status: Option<DaoStatus>,
    pub created_by: Option<String>,
    #[serde(flatten)]
    pub provenance: Provenance,
}

/// Read the proposal vote period out of a DAO policy payload.
/// The contract serializes it as a stringified nanosecond count; older
/// policies carry a bare number.
pub fn proposal_period(policy: &JsonValue) -> Option<u64> {
    match policy.get("proposal_period") {
        Some(JsonValue::String(s)) => s.parse().ok(),
        Some(JsonValue::Number(n)) => n.as_u64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn proposal_period_parses_stringified_nanos() {
        let policy = json!({ "proposal_period": "604800000000000" });
        assert_eq!(proposal_period(&policy), Some(604_800_000_000_000));
    }

    #[test]
    fn proposal_period_accepts_bare_numbers() {
        let policy = json!({ "proposal_period": 1000 });
        assert_eq!(proposal_period(&policy), Some(1000));
    }

    #[test]
    fn proposal_period_is_none_for_council_only_policies() {
        assert_eq!(proposal_period(&json!(["council.near"])), None);
        assert_eq!(proposal_period(&json!({ "proposal_period": "x" })), None);
    }
}
