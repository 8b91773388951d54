use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::{
    config::RankingConfig,
    models::{AdsMetrics, OpportunityRow},
};

/// Cost score given to every priced row when the batch has a single bid level
pub const FLAT_BID_CPC_SCORE: f64 = 100.0;

/// Combines trend momentum with paid-search demand and cost
///
/// Bid normalization is min-max over the rows of a single call, so scores are only
/// comparable within one ranking.
#[derive(Debug, Clone, Default)]
pub struct OpportunityRanker {
    config: RankingConfig,
}

impl OpportunityRanker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    /// Ranks queries by opportunity score, highest first
    ///
    /// `query_scores` pairs each query with its TOS composite. Every query appears
    /// in the output; queries without ads metrics get zero demand and cost scores.
    pub fn rank(
        &self,
        query_scores: &[(Uuid, f64)],
        ads_metrics: &HashMap<Uuid, AdsMetrics>,
    ) -> Vec<OpportunityRow> {
        let mut seen = HashSet::new();
        let batch: Vec<(Uuid, f64)> = query_scores
            .iter()
            .filter(|(id, _)| seen.insert(*id))
            .copied()
            .collect();

        let bid_range = bid_range(
            batch
                .iter()
                .filter_map(|(id, _)| ads_metrics.get(id))
                .filter_map(AdsMetrics::mid_bid_micros),
        );

        let mut rows: Vec<OpportunityRow> = batch
            .iter()
            .map(|(query_id, momentum)| {
                self.score_row(*query_id, *momentum, ads_metrics.get(query_id), bid_range)
            })
            .collect();

        rows.sort_by(|a, b| {
            b.opportunity_score
                .partial_cmp(&a.opportunity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.query_id.cmp(&b.query_id))
        });

        tracing::debug!(
            rows = rows.len(),
            with_metrics = rows.iter().filter(|r| r.demand_score > 0.0).count(),
            "Ranked opportunities"
        );

        rows
    }

    fn score_row(
        &self,
        query_id: Uuid,
        momentum: f64,
        metrics: Option<&AdsMetrics>,
        bid_range: Option<(f64, f64)>,
    ) -> OpportunityRow {
        let momentum_score = if momentum.is_finite() {
            momentum.clamp(0.0, 100.0)
        } else {
            0.0
        };

        let (demand_score, cpc_score, efficiency_score) = match metrics {
            Some(metrics) => {
                let demand = self.demand_score(metrics.avg_monthly_searches);
                let cpc = cpc_score(metrics.mid_bid_micros(), bid_range);
                let competition = metrics
                    .competition
                    .map_or(1.0, |level| level.efficiency_factor());
                let efficiency = (demand * cpc).sqrt() * competition;
                (demand, cpc, efficiency)
            }
            None => (0.0, 0.0, 0.0),
        };

        let RankingConfig {
            momentum_weight,
            demand_weight,
            efficiency_weight,
            ..
        } = self.config;
        let total_weight = momentum_weight + demand_weight + efficiency_weight;
        let opportunity_score = if total_weight > 0.0 {
            ((momentum_score * momentum_weight
                + demand_score * demand_weight
                + efficiency_score * efficiency_weight)
                / total_weight)
                .clamp(0.0, 100.0)
        } else {
            0.0
        };

        OpportunityRow {
            query_id,
            opportunity_score,
            efficiency_score,
            demand_score,
            momentum_score,
            cpc_score,
        }
    }

    /// Log-scaled monthly volume, reaching 100 at the saturation volume
    fn demand_score(&self, avg_monthly_searches: Option<u64>) -> f64 {
        match avg_monthly_searches {
            Some(searches) if searches > 0 => {
                let scaled = (1.0 + searches as f64).ln() / (1.0 + self.config.demand_saturation).ln();
                (100.0 * scaled).clamp(0.0, 100.0)
            }
            _ => 0.0,
        }
    }
}

fn bid_range(bids: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    bids.filter(|bid| bid.is_finite())
        .fold(None, |range, bid| match range {
            None => Some((bid, bid)),
            Some((low, high)) => Some((low.min(bid), high.max(bid))),
        })
}

/// Cheaper bids score higher; scaled against the batch's own bid range
fn cpc_score(bid: Option<f64>, range: Option<(f64, f64)>) -> f64 {
    match (bid, range) {
        (Some(bid), Some((low, high))) => {
            let spread = high - low;
            if spread <= f64::EPSILON {
                FLAT_BID_CPC_SCORE
            } else {
                (100.0 * (high - bid) / spread).clamp(0.0, 100.0)
            }
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Competition;

    fn metrics(searches: u64, low: u64, high: u64) -> AdsMetrics {
        AdsMetrics {
            avg_monthly_searches: Some(searches),
            top_of_page_bid_low_micros: Some(low),
            top_of_page_bid_high_micros: Some(high),
            competition: Some(Competition::Low),
        }
    }

    fn row(rows: &[OpportunityRow], id: Uuid) -> &OpportunityRow {
        rows.iter().find(|r| r.query_id == id).unwrap()
    }

    #[test]
    fn test_missing_metrics_fall_back_to_momentum() {
        let with_metrics = Uuid::new_v4();
        let without = Uuid::new_v4();
        let mut ads = HashMap::new();
        ads.insert(with_metrics, metrics(500, 200_000, 400_000));

        let rows = OpportunityRanker::default()
            .rank(&[(with_metrics, 50.0), (without, 50.0)], &ads);

        assert_eq!(rows.len(), 2);
        let priced = row(&rows, with_metrics);
        assert!(priced.demand_score > 0.0);
        assert!(priced.cpc_score > 0.0);

        let bare = row(&rows, without);
        assert_eq!(bare.demand_score, 0.0);
        assert_eq!(bare.cpc_score, 0.0);
        assert_eq!(bare.efficiency_score, 0.0);
        assert_eq!(bare.momentum_score, 50.0);
        assert!((bare.opportunity_score - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_cheaper_bids_score_higher_within_batch() {
        let cheap = Uuid::new_v4();
        let middle = Uuid::new_v4();
        let pricey = Uuid::new_v4();
        let mut ads = HashMap::new();
        ads.insert(cheap, metrics(1_000, 100_000, 100_000));
        ads.insert(middle, metrics(1_000, 300_000, 300_000));
        ads.insert(pricey, metrics(1_000, 500_000, 500_000));

        let rows = OpportunityRanker::default()
            .rank(&[(cheap, 40.0), (middle, 40.0), (pricey, 40.0)], &ads);

        assert_eq!(row(&rows, cheap).cpc_score, 100.0);
        assert!((row(&rows, middle).cpc_score - 50.0).abs() < 1e-9);
        assert_eq!(row(&rows, pricey).cpc_score, 0.0);
        assert_eq!(rows[0].query_id, cheap);
    }

    #[test]
    fn test_bid_normalization_is_per_call() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut ads = HashMap::new();
        ads.insert(a, metrics(1_000, 300_000, 300_000));
        ads.insert(b, metrics(1_000, 100_000, 100_000));
        let ranker = OpportunityRanker::default();

        let together = ranker.rank(&[(a, 40.0), (b, 40.0)], &ads);
        assert_eq!(row(&together, a).cpc_score, 0.0);

        let alone = ranker.rank(&[(a, 40.0)], &ads);
        assert_eq!(row(&alone, a).cpc_score, FLAT_BID_CPC_SCORE);
    }

    #[test]
    fn test_demand_is_log_scaled() {
        let ranker = OpportunityRanker::default();
        let small = ranker.demand_score(Some(100));
        let large = ranker.demand_score(Some(10_000));
        assert!(large > small);
        assert!(large < small * 100.0);
        assert_eq!(ranker.demand_score(Some(1_000_000)), 100.0);
        assert_eq!(ranker.demand_score(None), 0.0);
    }

    #[test]
    fn test_competition_discounts_efficiency() {
        let low = Uuid::new_v4();
        let high = Uuid::new_v4();
        let mut ads = HashMap::new();
        ads.insert(low, metrics(2_000, 100_000, 100_000));
        ads.insert(
            high,
            AdsMetrics {
                competition: Some(Competition::High),
                ..metrics(2_000, 100_000, 100_000)
            },
        );

        let rows = OpportunityRanker::default().rank(&[(low, 30.0), (high, 30.0)], &ads);
        let low_row = row(&rows, low);
        let high_row = row(&rows, high);
        assert!((high_row.efficiency_score - low_row.efficiency_score * 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_queries_ranked_once() {
        let id = Uuid::new_v4();
        let rows = OpportunityRanker::default().rank(&[(id, 70.0), (id, 10.0)], &HashMap::new());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].momentum_score, 70.0);
    }

    #[test]
    fn test_empty_batch() {
        let rows = OpportunityRanker::default().rank(&[], &HashMap::new());
        assert!(rows.is_empty());
    }
}
