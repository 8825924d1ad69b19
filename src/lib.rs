//! Aggregation service for factory-deployed DAO contracts on NEAR.
//!
//! The pipeline reads new transactions from an external chain-indexer
//! database, classifies them into domain events, reconciles current
//! on-chain snapshots against that history to recover creation and update
//! provenance, and upserts the enriched entities into its own Postgres
//! store. A fixed-interval scheduler drives the pipeline with at most one
//! run in flight.
//!
//! The embedding service supplies the [`snapshot::SnapshotSource`]
//! implementation (the RPC view-call client) and spawns
//! [`scheduler::Scheduler::run`].

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod db;
pub mod enrich;
pub mod ledger;
pub mod model;
pub mod scheduler;
pub mod snapshot;
pub mod store;

pub use aggregator::{Aggregator, RunCounts, RunOutcome, Trigger};
pub use config::AggregatorConfig;
pub use ledger::{LedgerClient, LedgerSource};
pub use scheduler::Scheduler;
pub use snapshot::SnapshotSource;
pub use store::{MaterializedStore, StoreSink};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber, honoring `RUST_LOG` and
/// defaulting to `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
