//! Deterministic composite id builders.
//!
//! All materialized ids are pure functions of the parent id plus the
//! sequence number assigned by the owning contract. They are never
//! regenerated and never reused, which is what makes the upsert sink
//! idempotent across runs.

/// `{name}.{factory_contract_id}`, the DAO's own account id.
pub fn build_dao_id(name: &str, factory_contract_id: &str) -> String {
    format!("{}.{}", name, factory_contract_id)
}

/// `{dao_id}-{proposal_sequence}`, with the sequence assigned by the DAO
/// contract.
pub fn build_proposal_id(dao_id: &str, proposal_id: u64) -> String {
    format!("{}-{}", dao_id, proposal_id)
}

/// `{dao_id}-{bounty_sequence}`.
pub fn build_bounty_id(dao_id: &str, bounty_id: u64) -> String {
    format!("{}-{}", dao_id, bounty_id)
}

/// `{dao_id}-{bounty_sequence}-{claim_sequence}`.
pub fn build_bounty_claim_id(dao_id: &str, bounty_id: u64, claim_id: u64) -> String {
    format!("{}-{}-{}", dao_id, bounty_id, claim_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dao_id_is_the_factory_subaccount() {
        assert_eq!(
            build_dao_id("alpha", "sputnik-dao.near"),
            "alpha.sputnik-dao.near"
        );
    }

    #[test]
    fn composite_ids_are_stable_across_calls() {
        let dao = build_dao_id("alpha", "factory.near");
        assert_eq!(build_proposal_id(&dao, 3), build_proposal_id(&dao, 3));
        assert_eq!(build_proposal_id(&dao, 3), "alpha.factory.near-3");
        assert_eq!(build_bounty_id(&dao, 0), "alpha.factory.near-0");
        assert_eq!(
            build_bounty_claim_id(&dao, 0, 2),
            "alpha.factory.near-0-2"
        );
    }
}
