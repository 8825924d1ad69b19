use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::bounty::BountyPayload;
use super::Provenance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    InProgress,
    Approved,
    Rejected,
    Removed,
    Expired,
    Moved,
}

/// Tagged union of the DAO contract's proposal kinds, in the contract's
/// externally-tagged JSON form: `{"AddBounty": {"bounty": {...}}}`,
/// `"Vote"`, etc.
///
/// Structural equality (`PartialEq`) over the decoded variant payloads is
/// the kind-matching contract used during reconciliation: two kinds are
/// equal exactly when the variant and every field of its payload are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProposalKind {
    ChangeConfig {
        config: JsonValue,
    },
    ChangePolicy {
        policy: JsonValue,
    },
    AddMemberToRole {
        member_id: String,
        role: String,
    },
    RemoveMemberFromRole {
        member_id: String,
        role: String,
    },
    FunctionCall {
        receiver_id: String,
        actions: JsonValue,
    },
    UpgradeSelf {
        hash: String,
    },
    UpgradeRemote {
        receiver_id: String,
        method_name: String,
        hash: String,
    },
    Transfer {
        token_id: String,
        receiver_id: String,
        amount: String,
        #[serde(default)]
        msg: Option<String>,
    },
    SetStakingContract {
        staking_id: String,
    },
    AddBounty {
        bounty: BountyPayload,
    },
    BountyDone {
        bounty_id: u64,
        receiver_id: String,
    },
    Vote,
}

/// Decode a raw `proposal.kind` argument payload into its canonical
/// representation. Unknown or malformed shapes decode to `None` and are
/// treated as "no match", never as an error.
pub fn cast_proposal_kind(value: &JsonValue) -> Option<ProposalKind> {
    serde_json::from_value(value.clone()).ok()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// `{dao_id}-{proposal_id}`.
    pub id: String,
    /// Sequence number assigned by the owning DAO contract.
    pub proposal_id: u64,
    pub dao_id: String,
    pub proposer: String,
    pub description: String,
    pub kind: ProposalKind,
    pub status: ProposalStatus,
    /// Nanosecond timestamp of submission, from the snapshot.
    pub submission_time: Option<u64>,
    /// `submission_time + policy.proposal_period`, when both are known.
    pub vote_period_end: Option<u64>,
    /// Raw vote map (`account id -> vote`) as the contract returns it.
    pub votes: JsonValue,
    #[serde(flatten)]
    pub provenance: Provenance,
}

/// When the voting window for a proposal closes.
pub fn calc_vote_period_end(submission_time: Option<u64>, policy: &JsonValue) -> Option<u64> {
    let period = super::dao::proposal_period(policy)?;
    submission_time?.checked_add(period)
}
