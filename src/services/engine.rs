use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::instrument;
use uuid::Uuid;

use crate::{
    config::{ClusteringConfig, Config},
    db::TrendRepository,
    error::{AppError, AppResult},
    models::{
        AdsMetrics, OpportunityCluster, OpportunityRow, Query, RawPoint, TimeWindow,
        TrendScoreResult,
    },
    services::{
        clustering::{validate_threshold, ClusterSignals, Clusterer},
        ranker::OpportunityRanker,
        scorer::TrendScorer,
    },
};

/// Entry point for scoring, clustering and ranking
///
/// Constructed against any [`TrendRepository`]; all I/O goes through it and
/// the engine itself keeps no state between calls.
#[derive(Clone)]
pub struct OpportunityEngine {
    repository: Arc<dyn TrendRepository>,
    scorer: TrendScorer,
    ranker: OpportunityRanker,
    clustering: ClusteringConfig,
    default_window: TimeWindow,
    rank_window: TimeWindow,
}

impl OpportunityEngine {
    pub fn new(repository: Arc<dyn TrendRepository>, config: &Config) -> Self {
        Self {
            repository,
            scorer: TrendScorer::new(config.scoring()),
            ranker: OpportunityRanker::new(config.ranking()),
            clustering: config.clustering(),
            default_window: config.default_window,
            rank_window: config.rank_window,
        }
    }

    /// Scores one query and stores the result
    ///
    /// A query with too little data yields a zero `declining` score rather than an error.
    #[instrument(skip(self))]
    pub async fn score_one(&self, query_id: Uuid, window: TimeWindow) -> AppResult<TrendScoreResult> {
        let result =
            score_or_degrade(self.repository.as_ref(), &self.scorer, query_id, window).await?;
        self.repository.save_score(&result).await?;

        tracing::debug!(
            query_id = %query_id,
            score = result.score,
            classification = ?result.classification,
            "Query scored"
        );

        Ok(result)
    }

    /// Scores many queries concurrently, one task per query
    ///
    /// Results follow the order of `query_ids`. A query whose scoring fails for any
    /// reason comes back as a zero `declining` score instead of failing the batch.
    /// A score that cannot be stored is logged and still returned.
    #[instrument(skip(self, query_ids), fields(count = query_ids.len()))]
    pub async fn score_many(
        &self,
        query_ids: &[Uuid],
        window: TimeWindow,
    ) -> AppResult<Vec<TrendScoreResult>> {
        let start = Instant::now();
        let mut tasks = Vec::with_capacity(query_ids.len());

        for &query_id in query_ids {
            let repository = Arc::clone(&self.repository);
            let scorer = self.scorer.clone();
            let task = tokio::spawn(async move {
                let result =
                    score_or_degrade(repository.as_ref(), &scorer, query_id, window).await?;
                if let Err(e) = repository.save_score(&result).await {
                    tracing::warn!(query_id = %query_id, error = %e, "Failed to store score");
                }
                Ok::<_, AppError>(result)
            });
            tasks.push((query_id, task));
        }

        let mut results = Vec::with_capacity(tasks.len());
        let mut failures = 0usize;

        for (query_id, task) in tasks {
            match task.await {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(e)) => {
                    tracing::warn!(query_id = %query_id, error = %e, "Scoring failed for query");
                    failures += 1;
                    results.push(TrendScoreResult::degraded(query_id, window));
                }
                Err(e) => {
                    tracing::error!(query_id = %query_id, error = %e, "Scoring task join error");
                    failures += 1;
                    results.push(TrendScoreResult::degraded(query_id, window));
                }
            }
        }

        if failures > 0 {
            tracing::warn!(
                success_count = results.len() - failures,
                error_count = failures,
                "Partial scoring failure"
            );
        }

        tracing::info!(
            scored = results.len(),
            processing_time_ms = start.elapsed().as_millis(),
            "Batch scoring completed"
        );

        Ok(results)
    }

    /// Scores queries in the configured default window
    pub async fn score_many_with_defaults(
        &self,
        query_ids: &[Uuid],
    ) -> AppResult<Vec<TrendScoreResult>> {
        self.score_many(query_ids, self.default_window).await
    }

    /// Scores every known query for a window
    pub async fn score_all(&self, window: TimeWindow) -> AppResult<Vec<TrendScoreResult>> {
        let ids: Vec<Uuid> = self
            .repository
            .all_queries()
            .await?
            .iter()
            .map(|q| q.id)
            .collect();
        self.score_many(&ids, window).await
    }

    /// Clusters all queries from scratch and replaces the stored clusters
    #[instrument(skip(self))]
    pub async fn cluster(&self, threshold: f64) -> AppResult<Vec<OpportunityCluster>> {
        self.build_clusters(threshold, false).await
    }

    /// Clusters all queries, keeping identifiers of clusters that carried over
    #[instrument(skip(self))]
    pub async fn recluster(&self, threshold: f64) -> AppResult<Vec<OpportunityCluster>> {
        self.build_clusters(threshold, true).await
    }

    /// Clusters with the configured threshold
    pub async fn cluster_with_defaults(&self) -> AppResult<Vec<OpportunityCluster>> {
        self.cluster(self.clustering.threshold).await
    }

    async fn build_clusters(
        &self,
        threshold: f64,
        keep_identities: bool,
    ) -> AppResult<Vec<OpportunityCluster>> {
        validate_threshold(threshold)?;
        let start = Instant::now();

        let queries = self.repository.all_queries().await?;
        let signals = self.collect_signals(&queries).await?;
        let prior = if keep_identities {
            Some(self.repository.clusters().await?)
        } else {
            None
        };

        let clusters = Clusterer::new(&queries, &signals, self.clustering.name_max_chars)
            .cluster_with_prior(threshold, prior.as_deref())?;

        self.repository.replace_clusters(&clusters).await?;

        tracing::info!(
            queries = queries.len(),
            clusters = clusters.len(),
            processing_time_ms = start.elapsed().as_millis(),
            "Clustering completed"
        );

        Ok(clusters)
    }

    /// Latest reference-window scores and intent labels for the given queries
    async fn collect_signals(&self, queries: &[Query]) -> AppResult<ClusterSignals> {
        let mut signals = ClusterSignals::default();
        for query in queries {
            if let Some(score) = self
                .repository
                .latest_score(query.id, self.clustering.reference_window)
                .await?
            {
                signals.scores.insert(query.id, score.score);
            }
            if let Some(intent) = self.repository.intent_classification(query.id).await? {
                signals.intents.insert(query.id, intent);
            }
        }
        Ok(signals)
    }

    /// Ranks queries by opportunity score
    ///
    /// Momentum is the stored score for the ranking window, computed on the fly
    /// (without storing it) when none exists. Lookup failures for one query leave
    /// that query with zero momentum or no ads metrics; it is never dropped.
    #[instrument(skip(self, query_ids), fields(count = query_ids.len()))]
    pub async fn rank(&self, query_ids: &[Uuid]) -> AppResult<Vec<OpportunityRow>> {
        let window = self.rank_window;
        let mut tasks = Vec::with_capacity(query_ids.len());

        for &query_id in query_ids {
            let repository = Arc::clone(&self.repository);
            let scorer = self.scorer.clone();
            let task = tokio::spawn(async move {
                let momentum = match repository.latest_score(query_id, window).await {
                    Ok(Some(stored)) => Ok(stored.score),
                    Ok(None) => score_or_degrade(repository.as_ref(), &scorer, query_id, window)
                        .await
                        .map(|result| result.score),
                    Err(e) => Err(e),
                };
                let metrics = repository.ads_metrics(query_id).await;
                (momentum, metrics)
            });
            tasks.push((query_id, task));
        }

        let mut query_scores = Vec::with_capacity(tasks.len());
        let mut ads_metrics: HashMap<Uuid, AdsMetrics> = HashMap::new();

        for (query_id, task) in tasks {
            let (momentum, metrics) = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(query_id = %query_id, error = %e, "Ranking task join error");
                    query_scores.push((query_id, 0.0));
                    continue;
                }
            };

            let momentum = momentum.unwrap_or_else(|e| {
                tracing::warn!(query_id = %query_id, error = %e, "Momentum lookup failed");
                0.0
            });
            query_scores.push((query_id, momentum));

            match metrics {
                Ok(Some(metrics)) => {
                    ads_metrics.insert(query_id, metrics);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(query_id = %query_id, error = %e, "Ads metrics lookup failed");
                }
            }
        }

        let rows = self.ranker.rank(&query_scores, &ads_metrics);

        tracing::info!(
            rows = rows.len(),
            with_metrics = ads_metrics.len(),
            "Ranking completed"
        );

        Ok(rows)
    }
}

/// Fetches a query's global snapshots for a window and scores them
async fn score_query(
    repository: &dyn TrendRepository,
    scorer: &TrendScorer,
    query_id: Uuid,
    window: TimeWindow,
) -> AppResult<TrendScoreResult> {
    let snapshots = repository.snapshots(query_id, window).await?;
    let raw: Vec<RawPoint> = snapshots
        .iter()
        .filter(|s| s.region.is_none())
        .map(RawPoint::from)
        .collect();

    if raw.is_empty() {
        return Err(AppError::MissingData(format!(
            "no global snapshots for query {} in {}",
            query_id, window
        )));
    }

    Ok(scorer.score_raw(query_id, &raw, window))
}

/// Like [`score_query`], but a query with no data scores zero instead of failing
async fn score_or_degrade(
    repository: &dyn TrendRepository,
    scorer: &TrendScorer,
    query_id: Uuid,
    window: TimeWindow,
) -> AppResult<TrendScoreResult> {
    match score_query(repository, scorer, query_id, window).await {
        Err(AppError::MissingData(reason)) => {
            tracing::debug!(query_id = %query_id, reason = %reason, "Returning zero score");
            Ok(TrendScoreResult::degraded(query_id, window))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockTrendRepository;
    use crate::models::{IntentType, TrendClassification, TrendSnapshot};
    use chrono::{Duration, NaiveDate, Utc};

    fn snapshots_for(query_id: Uuid, values: &[f64]) -> Vec<TrendSnapshot> {
        let start = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, value)| TrendSnapshot {
                query_id,
                date: start + Duration::days(i as i64 * 7),
                interest_value: *value,
                window: TimeWindow::TwelveMonths,
                region: None,
                calculated_at: Utc::now(),
            })
            .collect()
    }

    fn engine(repository: MockTrendRepository) -> OpportunityEngine {
        OpportunityEngine::new(Arc::new(repository), &Config::default())
    }

    #[tokio::test]
    async fn test_score_many_absorbs_short_series() {
        let good = Uuid::new_v4();
        let short = Uuid::new_v4();

        let mut repository = MockTrendRepository::new();
        repository.expect_snapshots().returning(move |id, _| {
            if id == good {
                Ok(snapshots_for(
                    id,
                    &[5.0, 8.0, 12.0, 15.0, 21.0, 26.0, 30.0, 38.0, 45.0, 51.0, 60.0, 72.0],
                ))
            } else {
                Ok(snapshots_for(id, &[40.0]))
            }
        });
        repository.expect_save_score().times(2).returning(|_| Ok(()));

        let results = engine(repository)
            .score_many(&[good, short], TimeWindow::TwelveMonths)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].query_id, good);
        assert!(results[0].score > 0.0);
        assert_eq!(results[1].query_id, short);
        assert_eq!(results[1].score, 0.0);
        assert_eq!(results[1].classification, TrendClassification::Declining);
    }

    #[tokio::test]
    async fn test_score_many_absorbs_repository_failures() {
        let ok = Uuid::new_v4();
        let broken = Uuid::new_v4();

        let mut repository = MockTrendRepository::new();
        repository.expect_snapshots().returning(move |id, _| {
            if id == broken {
                Err(AppError::Repository("connection reset".to_string()))
            } else {
                Ok(snapshots_for(id, &[10.0, 20.0, 30.0]))
            }
        });
        repository.expect_save_score().returning(|_| Ok(()));

        let results = engine(repository)
            .score_many(&[broken, ok], TimeWindow::TwelveMonths)
            .await
            .unwrap();

        assert_eq!(results[0].query_id, broken);
        assert_eq!(results[0].score, 0.0);
        assert!(results[1].score > 0.0);
    }

    #[tokio::test]
    async fn test_score_one_propagates_repository_failure() {
        let mut repository = MockTrendRepository::new();
        repository
            .expect_snapshots()
            .returning(|_, _| Err(AppError::Repository("timeout".to_string())));

        let result = engine(repository)
            .score_one(Uuid::new_v4(), TimeWindow::ThirtyDays)
            .await;
        assert!(matches!(result, Err(AppError::Repository(_))));
    }

    #[tokio::test]
    async fn test_score_one_ignores_regional_snapshots() {
        let id = Uuid::new_v4();
        let mut repository = MockTrendRepository::new();
        repository.expect_snapshots().returning(move |id, _| {
            let mut snapshots = snapshots_for(id, &[10.0, 60.0]);
            for snapshot in &mut snapshots {
                snapshot.region = Some("US".to_string());
            }
            Ok(snapshots)
        });
        repository.expect_save_score().times(1).returning(|_| Ok(()));

        let result = engine(repository)
            .score_one(id, TimeWindow::TwelveMonths)
            .await
            .unwrap();
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_invalid_threshold_rejected_before_any_lookup() {
        // No expectations: any repository call would panic
        let engine = engine(MockTrendRepository::new());
        let result = tokio_test::block_on(engine.cluster(1.5));
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_cluster_aggregates_and_stores() {
        let first = Query::new("how to reduce cash flow issues");
        let second = Query::new("fix cash flow problems");
        let (first_id, second_id) = (first.id, second.id);
        let queries = vec![first, second];

        let mut repository = MockTrendRepository::new();
        repository
            .expect_all_queries()
            .returning(move || Ok(queries.clone()));
        repository.expect_latest_score().returning(move |id, window| {
            if id == first_id {
                let mut stored = TrendScoreResult::degraded(id, window);
                stored.score = 64.0;
                Ok(Some(stored))
            } else {
                Ok(None)
            }
        });
        repository
            .expect_intent_classification()
            .returning(|_| Ok(Some(IntentType::Pain)));
        repository
            .expect_replace_clusters()
            .withf(|clusters| clusters.len() == 1)
            .times(1)
            .returning(|_| Ok(()));

        let clusters = engine(repository).cluster(0.3).await.unwrap();

        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].contains(&first_id));
        assert!(clusters[0].contains(&second_id));
        assert!((clusters[0].average_score - 32.0).abs() < 1e-9);
        assert_eq!(clusters[0].intent_type, Some(IntentType::Pain));
        assert_eq!(clusters[0].name, "how to reduce cash flow issues");
    }

    #[tokio::test]
    async fn test_rank_keeps_queries_when_lookups_fail() {
        let id = Uuid::new_v4();
        let mut repository = MockTrendRepository::new();
        repository
            .expect_latest_score()
            .returning(|_, _| Err(AppError::Repository("down".to_string())));
        repository
            .expect_ads_metrics()
            .returning(|_| Err(AppError::Repository("down".to_string())));

        let rows = engine(repository).rank(&[id]).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].query_id, id);
        assert_eq!(rows[0].opportunity_score, 0.0);
    }

    #[tokio::test]
    async fn test_score_many_returns_scores_that_fail_to_store() {
        let id = Uuid::new_v4();
        let mut repository = MockTrendRepository::new();
        repository
            .expect_snapshots()
            .returning(|id, _| Ok(snapshots_for(id, &[10.0, 20.0, 30.0, 45.0])));
        repository
            .expect_save_score()
            .times(1)
            .returning(|_| Err(AppError::Repository("disk full".to_string())));

        let results = engine(repository)
            .score_many(&[id], TimeWindow::TwelveMonths)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].point_count, 4);
        assert!(results[0].score > 0.0);
        assert_ne!(results[0].classification, TrendClassification::Declining);
    }

    #[tokio::test]
    async fn test_score_many_with_defaults_uses_configured_window() {
        let id = Uuid::new_v4();
        let mut repository = MockTrendRepository::new();
        repository
            .expect_snapshots()
            .withf(|_, window| *window == TimeWindow::ThirtyDays)
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        repository.expect_save_score().times(1).returning(|_| Ok(()));

        let config = Config {
            default_window: TimeWindow::ThirtyDays,
            ..Config::default()
        };
        let results = OpportunityEngine::new(Arc::new(repository), &config)
            .score_many_with_defaults(&[id])
            .await
            .unwrap();

        assert_eq!(results[0].window, TimeWindow::ThirtyDays);
        assert_eq!(results[0].score, 0.0);
    }
}
