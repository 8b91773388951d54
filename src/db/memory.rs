use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        AdsMetrics, IntentType, OpportunityCluster, Query, TimeWindow, TrendScoreResult,
        TrendSnapshot,
    },
};

use super::TrendRepository;

/// Repository backed by process memory
///
/// Cloning is cheap and every clone shares the same store, so one instance can be
/// handed to the engine while the caller keeps seeding it.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    inner: Arc<RwLock<RepositoryInner>>,
}

#[derive(Default)]
struct RepositoryInner {
    queries: HashMap<Uuid, Query>,
    snapshots: HashMap<(Uuid, TimeWindow), Vec<TrendSnapshot>>,
    intents: HashMap<Uuid, IntentType>,
    ads_metrics: HashMap<Uuid, AdsMetrics>,
    scores: HashMap<(Uuid, TimeWindow), TrendScoreResult>,
    clusters: Vec<OpportunityCluster>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_query(&self, query: Query) {
        let mut inner = self.inner.write().await;
        inner.queries.insert(query.id, query);
    }

    /// Appends snapshots; earlier captures for the same date are kept and superseded at scoring time
    pub async fn add_snapshots(&self, snapshots: impl IntoIterator<Item = TrendSnapshot>) {
        let mut inner = self.inner.write().await;
        for snapshot in snapshots {
            inner
                .snapshots
                .entry((snapshot.query_id, snapshot.window))
                .or_default()
                .push(snapshot);
        }
    }

    pub async fn set_intent(&self, query_id: Uuid, intent: IntentType) {
        let mut inner = self.inner.write().await;
        inner.intents.insert(query_id, intent);
    }

    pub async fn set_ads_metrics(&self, query_id: Uuid, metrics: AdsMetrics) {
        let mut inner = self.inner.write().await;
        inner.ads_metrics.insert(query_id, metrics);
    }
}

#[async_trait::async_trait]
impl TrendRepository for InMemoryRepository {
    async fn all_queries(&self) -> AppResult<Vec<Query>> {
        let inner = self.inner.read().await;
        let mut queries: Vec<Query> = inner.queries.values().cloned().collect();
        queries.sort_by_key(|q| q.id);
        Ok(queries)
    }

    async fn snapshots(&self, query_id: Uuid, window: TimeWindow) -> AppResult<Vec<TrendSnapshot>> {
        let inner = self.inner.read().await;
        Ok(inner
            .snapshots
            .get(&(query_id, window))
            .cloned()
            .unwrap_or_default())
    }

    async fn intent_classification(&self, query_id: Uuid) -> AppResult<Option<IntentType>> {
        let inner = self.inner.read().await;
        Ok(inner.intents.get(&query_id).copied())
    }

    async fn ads_metrics(&self, query_id: Uuid) -> AppResult<Option<AdsMetrics>> {
        let inner = self.inner.read().await;
        Ok(inner.ads_metrics.get(&query_id).cloned())
    }

    async fn latest_score(
        &self,
        query_id: Uuid,
        window: TimeWindow,
    ) -> AppResult<Option<TrendScoreResult>> {
        let inner = self.inner.read().await;
        Ok(inner.scores.get(&(query_id, window)).cloned())
    }

    async fn save_score(&self, score: &TrendScoreResult) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .scores
            .insert((score.query_id, score.window), score.clone());
        Ok(())
    }

    async fn clusters(&self) -> AppResult<Vec<OpportunityCluster>> {
        let inner = self.inner.read().await;
        Ok(inner.clusters.clone())
    }

    async fn replace_clusters(&self, clusters: &[OpportunityCluster]) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.clusters = clusters.to_vec();
        Ok(())
    }
}
