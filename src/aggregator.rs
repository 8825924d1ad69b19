//! Aggregation pipeline: one run fetches new ledger transactions past the
//! store watermark, classifies them into candidate sets, pulls current
//! snapshots for the affected entities, reconciles snapshots with history,
//! and upserts the enriched entities.
//!
//! Runs are serialized through a try-lock slot; a tick that fires while a
//! run is still in flight is skipped, never queued. Snapshot fetches and
//! per-entity upserts fail in isolation; ledger queries and the
//! transaction log append are run-fatal, so the watermark only advances
//! on a fully successful run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::classifier::{classify, ClassifiedBatch};
use crate::enrich::{enrich_bounties, enrich_daos, enrich_proposals, enrich_tokens};
use crate::ledger::{LedgerError, LedgerSource};
use crate::model::proposal::calc_vote_period_end;
use crate::snapshot::{SnapshotError, SnapshotSource};
use crate::store::{StoreError, StoreSink};

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What started the run. A bootstrap run seeds an empty store from the
/// full snapshot set; a scheduled run only processes ledger activity past
/// the watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Bootstrap,
    Scheduled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub daos: usize,
    pub proposals: usize,
    pub bounties: usize,
    pub tokens: usize,
    pub transactions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A scheduled run found an empty store; only a bootstrap run may
    /// seed it.
    SkippedNoWatermark,
    /// Another run was still in flight.
    SkippedOverlap,
    /// Nothing new past the watermark.
    UpToDate,
    Completed(RunCounts),
}

pub struct Aggregator {
    ledger: Arc<dyn LedgerSource>,
    snapshots: Arc<dyn SnapshotSource>,
    store: Arc<dyn StoreSink>,
    dao_factory: String,
    token_factory: String,
    run_slot: Mutex<()>,
}

impl Aggregator {
    pub fn new(
        ledger: Arc<dyn LedgerSource>,
        snapshots: Arc<dyn SnapshotSource>,
        store: Arc<dyn StoreSink>,
        dao_factory: impl Into<String>,
        token_factory: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            snapshots,
            store,
            dao_factory: dao_factory.into(),
            token_factory: token_factory.into(),
            run_slot: Mutex::new(()),
        }
    }

    /// Execute one aggregation run. At most one run is in flight at a
    /// time; a second caller gets [`RunOutcome::SkippedOverlap`]
    /// immediately.
    pub async fn run_once(&self, trigger: Trigger) -> Result<RunOutcome, AggregateError> {
        let Ok(_slot) = self.run_slot.try_lock() else {
            tracing::info!("Aggregation already in progress, skipping this trigger");
            return Ok(RunOutcome::SkippedOverlap);
        };

        let watermark = self.store.last_processed_transaction().await?;
        if trigger == Trigger::Scheduled && watermark.is_none() {
            tracing::warn!("Store has no watermark yet, waiting for a bootstrap run");
            return Ok(RunOutcome::SkippedNoWatermark);
        }

        let known_dao_ids = self.snapshots.dao_ids().await?;

        let mut tracked = known_dao_ids.clone();
        tracked.push(self.dao_factory.clone());
        tracked.push(self.token_factory.clone());

        // Inclusive fetch: the watermark transaction itself comes back, so
        // hash equality on the newest row means nothing new happened.
        let transactions = self
            .ledger
            .transactions_since(&tracked, watermark.as_ref().map(|w| w.block_timestamp))
            .await?;

        if let Some(mark) = &watermark {
            let newest = transactions.last();
            if newest.map_or(true, |tx| tx.transaction_hash == mark.transaction_hash) {
                tracing::info!("Ledger is at watermark {}, nothing to do", mark.transaction_hash);
                return Ok(RunOutcome::UpToDate);
            }
        }
        tracing::info!(
            "Aggregating {} new transactions ({:?} run)",
            transactions.len(),
            trigger
        );

        let batch = classify(&transactions, &self.dao_factory, &self.token_factory);
        let bootstrap = watermark.is_none();
        let (dao_candidates, token_symbols) = candidate_sets(&batch, &known_dao_ids, bootstrap);

        // Ledger failure is run-fatal: receipts are the only source of DAO
        // creation provenance, and once the watermark passes this batch the
        // DAO is never a candidate again.
        let accounts = self
            .ledger
            .accounts_by_contract_name(&self.dao_factory)
            .await?;

        let (daos, proposals, bounties, tokens) = tokio::join!(
            self.snapshots.get_current_daos(&dao_candidates),
            self.snapshots.get_current_proposals(&dao_candidates),
            self.snapshots
                .get_current_bounties(&dao_candidates, &batch.bounty_claim_signers),
            self.snapshots.get_current_tokens(token_symbols.as_deref()),
        );
        let daos = or_empty(daos, "DAO");
        let mut proposals = or_empty(proposals, "proposal");
        let bounties = or_empty(bounties, "bounty");
        let tokens = or_empty(tokens, "token");

        let prior_signers = self
            .store
            .signers_by_receiver(&dao_candidates)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Signer history fetch failed, member counts degraded: {}", e);
                HashMap::new()
            });

        let policies: HashMap<String, JsonValue> = daos
            .iter()
            .map(|d| (d.id.clone(), d.policy.clone()))
            .collect();
        for proposal in &mut proposals {
            if let Some(policy) = policies.get(&proposal.dao_id) {
                proposal.vote_period_end = calc_vote_period_end(proposal.submission_time, policy);
            }
        }

        let daos = enrich_daos(daos, &accounts, &transactions, &prior_signers);
        let mut proposals = enrich_proposals(proposals, &transactions);
        let mut bounties = enrich_bounties(bounties, &transactions);
        let tokens = enrich_tokens(tokens, &transactions, &self.token_factory);

        if bootstrap {
            // A failed DAO snapshot fetch must not orphan child rows.
            let enriched_ids: HashSet<&str> = daos.iter().map(|d| d.id.as_str()).collect();
            proposals.retain(|p| enriched_ids.contains(p.dao_id.as_str()));
            bounties.retain(|b| enriched_ids.contains(b.dao_id.as_str()));
        }

        let daos_written = count_ok(
            join_all(daos.iter().map(|d| self.store.upsert_dao(d))).await,
            "DAO",
        );
        let proposals_written = count_ok(
            join_all(proposals.iter().map(|p| self.store.upsert_proposal(p))).await,
            "proposal",
        );
        let bounties_written = count_ok(
            join_all(bounties.iter().map(|b| self.store.upsert_bounty(b))).await,
            "bounty",
        );
        let tokens_written = count_ok(
            join_all(tokens.iter().map(|t| self.store.upsert_token(t))).await,
            "token",
        );

        // Last: the transaction log carries the watermark, so it only
        // advances once the entity upserts have had their chance.
        self.store.record_transactions(&transactions).await?;

        let counts = RunCounts {
            daos: daos_written,
            proposals: proposals_written,
            bounties: bounties_written,
            tokens: tokens_written,
            transactions: transactions.len(),
        };

        tracing::info!(
            "Aggregation run complete: {} DAOs, {} proposals, {} bounties, {} tokens, {} transactions",
            counts.daos,
            counts.proposals,
            counts.bounties,
            counts.tokens,
            counts.transactions
        );
        Ok(RunOutcome::Completed(counts))
    }
}

/// Which entities this run re-snapshots. A bootstrap run covers every
/// known DAO and the full token list; an incremental run only the DAOs
/// and tokens the batch touched.
fn candidate_sets(
    batch: &ClassifiedBatch,
    known_dao_ids: &[String],
    bootstrap: bool,
) -> (Vec<String>, Option<Vec<String>>) {
    if bootstrap {
        return (known_dao_ids.to_vec(), None);
    }

    let mut dao_candidates = batch.new_dao_ids.clone();
    for id in &batch.touched_dao_ids {
        if !dao_candidates.contains(id) {
            dao_candidates.push(id.clone());
        }
    }
    (dao_candidates, Some(batch.new_token_symbols.clone()))
}

fn or_empty<T>(result: Result<Vec<T>, SnapshotError>, what: &str) -> Vec<T> {
    result.unwrap_or_else(|e| {
        tracing::warn!("{} snapshot fetch failed, skipping the kind this run: {}", what, e);
        Vec::new()
    })
}

fn count_ok(results: Vec<Result<(), StoreError>>, what: &str) -> usize {
    let mut ok = 0;
    for result in results {
        match result {
            Ok(()) => ok += 1,
            Err(e) => tracing::warn!("{} upsert failed: {}", what, e),
        }
    }
    ok
}
