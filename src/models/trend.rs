use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TimeWindow;

/// One interest-over-time sample as captured from the trends collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendSnapshot {
    pub query_id: Uuid,
    pub date: NaiveDate,
    /// Interest on a 0-100 scale, 0 when the source had no data
    pub interest_value: f64,
    pub window: TimeWindow,
    #[serde(default)]
    pub region: Option<String>,
    /// When this sample was captured; later captures supersede earlier ones for the same date
    pub calculated_at: DateTime<Utc>,
}

/// Unnormalized sample handed to the normalizer
#[derive(Debug, Clone, PartialEq)]
pub struct RawPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub captured_at: Option<DateTime<Utc>>,
}

impl RawPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self {
            date,
            value,
            captured_at: None,
        }
    }
}

impl From<&TrendSnapshot> for RawPoint {
    fn from(snapshot: &TrendSnapshot) -> Self {
        Self {
            date: snapshot.date,
            value: snapshot.interest_value,
            captured_at: Some(snapshot.calculated_at),
        }
    }
}

impl From<TrendPoint> for RawPoint {
    fn from(point: TrendPoint) -> Self {
        Self::new(point.date, point.value)
    }
}

/// A cleaned sample: one per calendar date, strictly increasing in a normalized series
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Trend regime a query falls into
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TrendClassification {
    Breakout,
    Growing,
    Stable,
    Declining,
}

/// The four 0-100 sub-scores behind a composite score
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub slope: f64,
    pub acceleration: f64,
    pub consistency: f64,
    pub breadth: f64,
}

/// Trend Opportunity Score for one query over one window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendScoreResult {
    pub query_id: Uuid,
    pub window: TimeWindow,
    /// Composite score in [0, 100]
    pub score: f64,
    pub classification: TrendClassification,
    pub breakdown: ScoreBreakdown,
    /// Least-squares slope in interest points per day
    pub slope_per_day: f64,
    pub point_count: usize,
    pub calculated_at: DateTime<Utc>,
}

impl TrendScoreResult {
    /// Zero score used when a query has too little data to score
    pub fn degraded(query_id: Uuid, window: TimeWindow) -> Self {
        Self {
            query_id,
            window,
            score: 0.0,
            classification: TrendClassification::Declining,
            breakdown: ScoreBreakdown::default(),
            slope_per_day: 0.0,
            point_count: 0,
            calculated_at: Utc::now(),
        }
    }
}
