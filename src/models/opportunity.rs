use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Advertiser competition level reported alongside keyword metrics
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Competition {
    Low,
    Medium,
    High,
    Unspecified,
}

impl Competition {
    /// Multiplier applied to the efficiency score; crowded keywords are worth less
    pub fn efficiency_factor(self) -> f64 {
        match self {
            Competition::Low => 1.0,
            Competition::Medium => 0.85,
            Competition::High => 0.7,
            Competition::Unspecified => 1.0,
        }
    }
}

/// Paid-search keyword metrics for a query
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AdsMetrics {
    #[serde(default)]
    pub avg_monthly_searches: Option<u64>,
    #[serde(default)]
    pub top_of_page_bid_low_micros: Option<u64>,
    #[serde(default)]
    pub top_of_page_bid_high_micros: Option<u64>,
    #[serde(default)]
    pub competition: Option<Competition>,
}

impl AdsMetrics {
    /// Midpoint of the top-of-page bid range, falling back to whichever bound is known
    pub fn mid_bid_micros(&self) -> Option<f64> {
        match (self.top_of_page_bid_low_micros, self.top_of_page_bid_high_micros) {
            (Some(low), Some(high)) => Some((low as f64 + high as f64) / 2.0),
            (Some(bid), None) | (None, Some(bid)) => Some(bid as f64),
            (None, None) => None,
        }
    }
}

/// Ranked opportunity view of a single query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpportunityRow {
    pub query_id: Uuid,
    pub opportunity_score: f64,
    pub efficiency_score: f64,
    pub demand_score: f64,
    pub momentum_score: f64,
    pub cpc_score: f64,
}
