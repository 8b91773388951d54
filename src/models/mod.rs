use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::error::AppError;

pub mod cluster;
pub mod opportunity;
pub mod query;
pub mod trend;

pub use cluster::OpportunityCluster;
pub use opportunity::{AdsMetrics, Competition, OpportunityRow};
pub use query::{IntentType, Query};
pub use trend::{
    RawPoint, ScoreBreakdown, TrendClassification, TrendPoint, TrendScoreResult, TrendSnapshot,
};

/// Lookback period for a trend series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeWindow {
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "90d")]
    NinetyDays,
    #[serde(rename = "12m")]
    TwelveMonths,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 3] = [
        TimeWindow::ThirtyDays,
        TimeWindow::NinetyDays,
        TimeWindow::TwelveMonths,
    ];

    /// Length of the window in calendar days
    pub fn days(self) -> i64 {
        match self {
            TimeWindow::ThirtyDays => 30,
            TimeWindow::NinetyDays => 90,
            TimeWindow::TwelveMonths => 365,
        }
    }

    /// Length of the sub-periods used for breadth (weeks, or months for 12m)
    pub fn sub_period_days(self) -> i64 {
        match self {
            TimeWindow::ThirtyDays | TimeWindow::NinetyDays => 7,
            TimeWindow::TwelveMonths => 30,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeWindow::ThirtyDays => "30d",
            TimeWindow::NinetyDays => "90d",
            TimeWindow::TwelveMonths => "12m",
        }
    }
}

impl Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "30d" => Ok(TimeWindow::ThirtyDays),
            "90d" => Ok(TimeWindow::NinetyDays),
            "12m" => Ok(TimeWindow::TwelveMonths),
            other => Err(AppError::InvalidArgument(format!(
                "Unknown time window '{}', expected one of 30d, 90d, 12m",
                other
            ))),
        }
    }
}
