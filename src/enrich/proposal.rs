use crate::classifier::METHOD_ADD_PROPOSAL;
use crate::ledger::Transaction;
use crate::model::proposal::cast_proposal_kind;
use crate::model::Proposal;

use super::{transactions_by_receiver, with_args};

/// Enrich proposal snapshots with creation and update provenance.
///
/// The creation event is the first `add_proposal` transaction whose
/// decoded description, kind (under the kind's canonical representation),
/// and signer all equal the snapshot's description/kind/proposer. The
/// update event is the last transaction of any method whose decoded `id`
/// argument equals the proposal's sequence number. When only a creation
/// match exists it serves as both; when no creation match exists the
/// create fields stay unset; provenance is never inferred.
pub fn enrich_proposals(proposals: Vec<Proposal>, transactions: &[Transaction]) -> Vec<Proposal> {
    let by_receiver = transactions_by_receiver(transactions);

    proposals
        .into_iter()
        .map(|mut proposal| {
            let Some(dao_txs) = by_receiver.get(proposal.dao_id.as_str()) else {
                // Owning DAO saw no new activity; pass the snapshot through.
                return proposal;
            };
            let candidates = with_args(dao_txs);

            let create_match = candidates.iter().find(|tx| {
                if tx.method_name() != Some(METHOD_ADD_PROPOSAL) {
                    return false;
                }
                let Some(payload) = tx.args().and_then(|a| a.get("proposal")) else {
                    return false;
                };
                let description = payload.get("description").and_then(|v| v.as_str());
                let kind = payload.get("kind").and_then(cast_proposal_kind);

                description == Some(proposal.description.as_str())
                    && kind.as_ref() == Some(&proposal.kind)
                    && tx.signer_account_id == proposal.proposer
            });

            let update_match = candidates
                .iter()
                .filter(|tx| {
                    tx.args().and_then(|a| a.get("id")).and_then(|v| v.as_u64())
                        == Some(proposal.proposal_id)
                })
                .last();

            if let Some(tx) = create_match {
                proposal
                    .provenance
                    .set_create(&tx.transaction_hash, tx.block_timestamp);
            }
            if let Some(tx) = update_match.or(create_match) {
                proposal
                    .provenance
                    .set_update(&tx.transaction_hash, tx.block_timestamp);
            }

            proposal
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::fixtures::tx;
    use crate::model::{Provenance, ProposalKind, ProposalStatus};
    use serde_json::json;

    const DAO: &str = "alpha.factory.near";

    fn proposal(seq: u64, description: &str, proposer: &str) -> Proposal {
        Proposal {
            id: format!("{}-{}", DAO, seq),
            proposal_id: seq,
            dao_id: DAO.to_string(),
            proposer: proposer.to_string(),
            description: description.to_string(),
            kind: ProposalKind::Vote,
            status: ProposalStatus::InProgress,
            submission_time: None,
            vote_period_end: None,
            votes: json!({}),
            provenance: Provenance::default(),
        }
    }

    fn add_proposal_tx(hash: &str, signer: &str, timestamp: u64, description: &str) -> Transaction {
        tx(
            hash,
            signer,
            DAO,
            timestamp,
            METHOD_ADD_PROPOSAL,
            Some(json!({
                "proposal": { "description": description, "kind": "Vote" }
            })),
        )
    }

    #[test]
    fn creation_requires_all_fields_to_match_at_once() {
        let enriched = enrich_proposals(
            vec![proposal(0, "x", "alice.near")],
            &[
                // Wrong signer.
                add_proposal_tx("t1", "bob.near", 150, "x"),
                // Wrong description.
                add_proposal_tx("t2", "alice.near", 155, "y"),
                // Full match.
                add_proposal_tx("t3", "alice.near", 160, "x"),
            ],
        );

        assert_eq!(enriched[0].provenance.transaction_hash.as_deref(), Some("t3"));
        assert_eq!(enriched[0].provenance.create_timestamp, Some(160));
    }

    #[test]
    fn first_match_creates_last_id_match_updates() {
        let enriched = enrich_proposals(
            vec![proposal(0, "x", "alice.near")],
            &[
                add_proposal_tx("t1", "alice.near", 150, "x"),
                add_proposal_tx("t2", "alice.near", 160, "x"),
                tx(
                    "t3",
                    "bob.near",
                    DAO,
                    170,
                    "act_proposal",
                    Some(json!({ "id": 0, "action": "VoteApprove" })),
                ),
            ],
        );

        let p = &enriched[0];
        assert_eq!(p.provenance.transaction_hash.as_deref(), Some("t1"));
        assert_eq!(p.provenance.create_timestamp, Some(150));
        assert_eq!(p.provenance.update_transaction_hash.as_deref(), Some("t3"));
        assert_eq!(p.provenance.update_timestamp, Some(170));
    }

    #[test]
    fn create_match_doubles_as_update_when_nothing_newer() {
        let enriched = enrich_proposals(
            vec![proposal(0, "x", "alice.near")],
            &[add_proposal_tx("t1", "alice.near", 150, "x")],
        );

        assert_eq!(
            enriched[0].provenance.update_transaction_hash.as_deref(),
            Some("t1")
        );
    }

    #[test]
    fn no_match_keeps_null_provenance_instead_of_dropping() {
        let enriched = enrich_proposals(
            vec![proposal(5, "unseen", "alice.near")],
            &[add_proposal_tx("t1", "bob.near", 150, "other")],
        );

        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].provenance, Provenance::default());
    }

    #[test]
    fn dao_without_batch_activity_passes_through_unmodified() {
        let original = proposal(0, "x", "alice.near");
        let enriched = enrich_proposals(
            vec![original.clone()],
            &[tx(
                "t1",
                "bob.near",
                "other.factory.near",
                150,
                "act_proposal",
                Some(json!({ "id": 0 })),
            )],
        );

        assert_eq!(enriched[0], original);
    }

    #[test]
    fn update_match_ignores_rows_without_decodable_args() {
        let mut no_args = tx("t2", "bob.near", DAO, 170, "act_proposal", None);
        no_args.action.args_json = None;

        let enriched = enrich_proposals(
            vec![proposal(0, "x", "alice.near")],
            &[add_proposal_tx("t1", "alice.near", 150, "x"), no_args],
        );

        assert_eq!(
            enriched[0].provenance.update_transaction_hash.as_deref(),
            Some("t1")
        );
    }
}
