use serde::{Deserialize, Serialize};

use super::Provenance;

/// Bounty body as it appears inside an `AddBounty` proposal kind.
///
/// This is the exact field set compared during bounty reconciliation: a
/// transaction matches a bounty only when every field here is equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BountyPayload {
    pub description: String,
    pub token: String,
    /// Yocto amount as decimal string.
    pub amount: String,
    /// How many times the bounty can be claimed and paid out.
    pub times: u32,
    /// Maximum claim duration, stringified nanoseconds.
    pub max_deadline: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounty {
    /// `{dao_id}-{bounty_id}`.
    pub id: String,
    /// Sequence number assigned by the owning DAO contract.
    pub bounty_id: u64,
    pub dao_id: String,
    pub description: String,
    pub token: String,
    pub amount: String,
    pub times: u32,
    pub max_deadline: String,
    pub claims: Vec<BountyClaim>,
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl Bounty {
    /// The payload an `add_proposal` transaction must carry to match this
    /// bounty.
    pub fn payload(&self) -> BountyPayload {
        BountyPayload {
            description: self.description.clone(),
            token: self.token.clone(),
            amount: self.amount.clone(),
            times: self.times,
            max_deadline: self.max_deadline.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BountyClaim {
    /// `{dao_id}-{bounty_id}-{claim_id}`.
    pub id: String,
    /// The claimant account.
    pub account_id: String,
    /// Claim start, stringified nanoseconds.
    pub start_time: String,
    /// Claim duration chosen by the claimant, stringified nanoseconds.
    pub deadline: String,
    pub completed: bool,
    /// `start_time + deadline`; computed during enrichment.
    pub end_time: Option<String>,
    /// Provenance of the matching `bounty_claim` transaction. Claims only
    /// ever have creation provenance.
    pub transaction_hash: Option<String>,
    pub create_timestamp: Option<u64>,
}

/// `start_time + deadline` as a decimal string; both operands are u128
/// nanosecond counts that overflow u64.
pub fn calc_claim_end_time(start_time: &str, deadline: &str) -> Option<String> {
    let start: u128 = start_time.parse().ok()?;
    let deadline: u128 = deadline.parse().ok()?;
    start.checked_add(deadline).map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_end_time_is_start_plus_deadline() {
        assert_eq!(
            calc_claim_end_time("1630000000000000000", "604800000000000"),
            Some("1630604800000000000".to_string())
        );
    }

    #[test]
    fn claim_end_time_tolerates_malformed_input() {
        assert_eq!(calc_claim_end_time("", "100"), None);
        assert_eq!(calc_claim_end_time("abc", "100"), None);
    }
}
