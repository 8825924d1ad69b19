use serde_json::Value as JsonValue;

use crate::classifier::{METHOD_ADD_PROPOSAL, METHOD_BOUNTY_CLAIM};
use crate::ledger::Transaction;
use crate::model::bounty::calc_claim_end_time;
use crate::model::proposal::cast_proposal_kind;
use crate::model::{Bounty, ProposalKind};

use super::{transactions_by_receiver, with_args};

/// Enrich bounty snapshots (and their claims) with provenance.
///
/// A transaction matches a bounty when it is an `add_proposal` whose kind
/// decodes to the bounty-creation variant and whose amount, description,
/// times, max deadline, and token all equal the snapshot's fields. The
/// first such transaction is the creation event, the last the most recent
/// update. Claims are matched independently against `bounty_claim`
/// transactions by claimant, bounty sequence id, and deadline.
pub fn enrich_bounties(bounties: Vec<Bounty>, transactions: &[Transaction]) -> Vec<Bounty> {
    let by_receiver = transactions_by_receiver(transactions);

    bounties
        .into_iter()
        .map(|mut bounty| {
            let Some(dao_txs) = by_receiver.get(bounty.dao_id.as_str()) else {
                return bounty;
            };
            let candidates = with_args(dao_txs);

            let expected = bounty.payload();
            let matches: Vec<_> = candidates
                .iter()
                .filter(|tx| {
                    if tx.method_name() != Some(METHOD_ADD_PROPOSAL) {
                        return false;
                    }
                    let kind = tx
                        .args()
                        .and_then(|a| a.pointer("/proposal/kind"))
                        .and_then(cast_proposal_kind);
                    matches!(kind, Some(ProposalKind::AddBounty { bounty }) if bounty == expected)
                })
                .collect();

            if let Some(first) = matches.first() {
                bounty
                    .provenance
                    .set_create(&first.transaction_hash, first.block_timestamp);
            }
            // A single match serves as both creation and update.
            if let Some(last) = matches.last() {
                bounty
                    .provenance
                    .set_update(&last.transaction_hash, last.block_timestamp);
            }

            let claim_txs: Vec<_> = candidates
                .iter()
                .filter(|tx| tx.method_name() == Some(METHOD_BOUNTY_CLAIM))
                .collect();

            let bounty_id = bounty.bounty_id;
            for claim in &mut bounty.claims {
                let matched = claim_txs.iter().find(|tx| {
                    let Some(args) = tx.args() else { return false };
                    tx.signer_account_id == claim.account_id
                        && args.get("id").and_then(|v| v.as_u64()) == Some(bounty_id)
                        && json_eq_string(args.get("deadline"), &claim.deadline)
                });

                if let Some(tx) = matched {
                    claim.transaction_hash = Some(tx.transaction_hash.clone());
                    claim.create_timestamp = Some(tx.block_timestamp);
                }
                claim.end_time = calc_claim_end_time(&claim.start_time, &claim.deadline);
            }

            bounty
        })
        .collect()
}

/// Claim deadlines are stringified u64 nanoseconds, but older contract
/// versions sent them as bare numbers.
fn json_eq_string(value: Option<&JsonValue>, expected: &str) -> bool {
    match value {
        Some(JsonValue::String(s)) => s == expected,
        Some(JsonValue::Number(n)) => n.to_string() == expected,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::fixtures::tx;
    use crate::model::{BountyClaim, Provenance};
    use serde_json::json;

    const DAO: &str = "alpha.factory.near";

    fn bounty(seq: u64) -> Bounty {
        Bounty {
            id: format!("{}-{}", DAO, seq),
            bounty_id: seq,
            dao_id: DAO.to_string(),
            description: "fix the docs".to_string(),
            token: "wrap.near".to_string(),
            amount: "1000".to_string(),
            times: 3,
            max_deadline: "604800000000000".to_string(),
            claims: Vec::new(),
            provenance: Provenance::default(),
        }
    }

    fn add_bounty_tx(hash: &str, timestamp: u64, amount: &str) -> Transaction {
        tx(
            hash,
            "alice.near",
            DAO,
            timestamp,
            METHOD_ADD_PROPOSAL,
            Some(json!({
                "proposal": {
                    "description": "bounty proposal",
                    "kind": {
                        "AddBounty": {
                            "bounty": {
                                "description": "fix the docs",
                                "token": "wrap.near",
                                "amount": amount,
                                "times": 3,
                                "max_deadline": "604800000000000"
                            }
                        }
                    }
                }
            })),
        )
    }

    #[test]
    fn first_and_last_field_equal_matches_become_create_and_update() {
        let enriched = enrich_bounties(
            vec![bounty(0)],
            &[
                add_bounty_tx("t1", 150, "1000"),
                // Differing amount: partial matches never count.
                add_bounty_tx("t2", 155, "2000"),
                add_bounty_tx("t3", 160, "1000"),
            ],
        );

        let b = &enriched[0];
        assert_eq!(b.provenance.transaction_hash.as_deref(), Some("t1"));
        assert_eq!(b.provenance.create_timestamp, Some(150));
        assert_eq!(b.provenance.update_transaction_hash.as_deref(), Some("t3"));
        assert_eq!(b.provenance.update_timestamp, Some(160));
    }

    #[test]
    fn claims_match_by_claimant_sequence_and_deadline() {
        let mut b = bounty(0);
        b.claims = vec![
            BountyClaim {
                id: format!("{}-0-0", DAO),
                account_id: "carol.near".to_string(),
                start_time: "1000".to_string(),
                deadline: "500".to_string(),
                completed: false,
                end_time: None,
                transaction_hash: None,
                create_timestamp: None,
            },
            BountyClaim {
                id: format!("{}-0-1", DAO),
                account_id: "dave.near".to_string(),
                start_time: "1000".to_string(),
                deadline: "999".to_string(),
                completed: false,
                end_time: None,
                transaction_hash: None,
                create_timestamp: None,
            },
        ];

        let enriched = enrich_bounties(
            vec![b],
            &[tx(
                "t9",
                "carol.near",
                DAO,
                170,
                METHOD_BOUNTY_CLAIM,
                Some(json!({ "id": 0, "deadline": "500" })),
            )],
        );

        let claims = &enriched[0].claims;
        assert_eq!(claims[0].transaction_hash.as_deref(), Some("t9"));
        assert_eq!(claims[0].create_timestamp, Some(170));
        assert_eq!(claims[0].end_time.as_deref(), Some("1500"));
        // Deadline differs: no provenance, claim still kept.
        assert_eq!(claims[1].transaction_hash, None);
        assert_eq!(claims[1].end_time.as_deref(), Some("1999"));
    }

    #[test]
    fn numeric_deadlines_still_match_string_snapshots() {
        let mut b = bounty(0);
        b.claims = vec![BountyClaim {
            id: format!("{}-0-0", DAO),
            account_id: "carol.near".to_string(),
            start_time: "1000".to_string(),
            deadline: "500".to_string(),
            completed: false,
            end_time: None,
            transaction_hash: None,
            create_timestamp: None,
        }];

        let enriched = enrich_bounties(
            vec![b],
            &[tx(
                "t9",
                "carol.near",
                DAO,
                170,
                METHOD_BOUNTY_CLAIM,
                Some(json!({ "id": 0, "deadline": 500 })),
            )],
        );

        assert_eq!(enriched[0].claims[0].transaction_hash.as_deref(), Some("t9"));
    }

    #[test]
    fn dao_without_batch_activity_passes_through() {
        let original = bounty(0);
        let enriched = enrich_bounties(vec![original.clone()], &[]);
        assert_eq!(enriched[0], original);
    }
}
