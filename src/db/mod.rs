//! Storage abstraction the core is constructed against
//!
//! The core never talks to a database directly. Callers inject an implementation of
//! [`TrendRepository`] that reads queries, snapshots and collaborator signals and
//! receives the scores and clusters the core computes.

use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        AdsMetrics, IntentType, OpportunityCluster, Query, TimeWindow, TrendScoreResult,
        TrendSnapshot,
    },
};

pub mod memory;

pub use memory::InMemoryRepository;

/// Trait for query, snapshot and score storage
///
/// Lookups for unknown ids return empty collections or `None` rather than errors;
/// an `Err` always means the store itself failed.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TrendRepository: Send + Sync {
    /// All tracked queries
    async fn all_queries(&self) -> AppResult<Vec<Query>>;

    /// Interest samples for a query captured for the given window
    async fn snapshots(&self, query_id: Uuid, window: TimeWindow) -> AppResult<Vec<TrendSnapshot>>;

    /// Intent label previously assigned by the classification collaborator
    async fn intent_classification(&self, query_id: Uuid) -> AppResult<Option<IntentType>>;

    /// Paid-search metrics, `None` when the ads collaborator has nothing for the query
    async fn ads_metrics(&self, query_id: Uuid) -> AppResult<Option<AdsMetrics>>;

    /// Most recently saved score for a query and window
    async fn latest_score(
        &self,
        query_id: Uuid,
        window: TimeWindow,
    ) -> AppResult<Option<TrendScoreResult>>;

    /// Stores a score, replacing any earlier one for the same query and window
    async fn save_score(&self, score: &TrendScoreResult) -> AppResult<()>;

    /// Clusters produced by the last clustering run
    async fn clusters(&self) -> AppResult<Vec<OpportunityCluster>>;

    /// Replaces the stored clusters wholesale
    async fn replace_clusters(&self, clusters: &[OpportunityCluster]) -> AppResult<()>;
}
