use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::ScoringConfig,
    models::{
        RawPoint, ScoreBreakdown, TimeWindow, TrendClassification, TrendPoint, TrendScoreResult,
    },
    services::normalizer::{normalize, MIN_SERIES_POINTS},
};

/// Composite score at or above which a rising query is a breakout
pub const BREAKOUT_THRESHOLD: f64 = 80.0;
pub const GROWING_THRESHOLD: f64 = 60.0;
pub const STABLE_THRESHOLD: f64 = 40.0;

/// Relative weight of each sub-score in the composite
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub slope: f64,
    pub acceleration: f64,
    pub consistency: f64,
    pub breadth: f64,
}

/// Short windows reward movement
pub const THIRTY_DAY_WEIGHTS: ScoreWeights = ScoreWeights {
    slope: 0.40,
    acceleration: 0.25,
    consistency: 0.15,
    breadth: 0.20,
};

pub const NINETY_DAY_WEIGHTS: ScoreWeights = ScoreWeights {
    slope: 0.30,
    acceleration: 0.20,
    consistency: 0.25,
    breadth: 0.25,
};

/// Long windows reward staying power
pub const TWELVE_MONTH_WEIGHTS: ScoreWeights = ScoreWeights {
    slope: 0.20,
    acceleration: 0.15,
    consistency: 0.35,
    breadth: 0.30,
};

/// Projected change across the window, in interest points, that earns a full slope score
pub const THIRTY_DAY_FULL_SCALE: f64 = 50.0;
pub const NINETY_DAY_FULL_SCALE: f64 = 60.0;
pub const TWELVE_MONTH_FULL_SCALE: f64 = 80.0;

pub fn weights_for(window: TimeWindow) -> ScoreWeights {
    match window {
        TimeWindow::ThirtyDays => THIRTY_DAY_WEIGHTS,
        TimeWindow::NinetyDays => NINETY_DAY_WEIGHTS,
        TimeWindow::TwelveMonths => TWELVE_MONTH_WEIGHTS,
    }
}

pub fn full_scale_for(window: TimeWindow) -> f64 {
    match window {
        TimeWindow::ThirtyDays => THIRTY_DAY_FULL_SCALE,
        TimeWindow::NinetyDays => NINETY_DAY_FULL_SCALE,
        TimeWindow::TwelveMonths => TWELVE_MONTH_FULL_SCALE,
    }
}

/// Computes Trend Opportunity Scores
///
/// Holds no state between calls, so one scorer can be shared across tasks.
#[derive(Debug, Clone, Default)]
pub struct TrendScorer {
    config: ScoringConfig,
}

impl TrendScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Normalizes raw samples and scores them, degrading to a zero score when
    /// the samples cannot form a series
    pub fn score_raw(
        &self,
        query_id: Uuid,
        raw_points: &[RawPoint],
        window: TimeWindow,
    ) -> TrendScoreResult {
        match normalize(raw_points, window) {
            Ok(series) => self.score(query_id, &series, window),
            Err(e) => {
                tracing::debug!(query_id = %query_id, window = %window, error = %e, "Series unusable, returning zero score");
                TrendScoreResult::degraded(query_id, window)
            }
        }
    }

    /// Scores a normalized series
    ///
    /// Dates act as the x axis, so missing days simply carry no weight.
    pub fn score(
        &self,
        query_id: Uuid,
        series: &[TrendPoint],
        window: TimeWindow,
    ) -> TrendScoreResult {
        if series.len() < MIN_SERIES_POINTS {
            return TrendScoreResult::degraded(query_id, window);
        }

        let origin = series[0].date;
        let points: Vec<(f64, f64)> = series
            .iter()
            .map(|p| ((p.date - origin).num_days() as f64, p.value))
            .collect();

        let slope_per_day = least_squares_slope(&points);
        let full_scale = full_scale_for(window);
        let window_days = window.days() as f64;

        let breakdown = ScoreBreakdown {
            slope: slope_score(slope_per_day, window_days, full_scale),
            acceleration: acceleration_score(&points, window_days, full_scale),
            consistency: consistency_score(&points, slope_per_day),
            breadth: breadth_score(
                &points,
                window.sub_period_days(),
                self.config.breadth_floor,
            ),
        };

        let weights = weights_for(window);
        let score = (breakdown.slope * weights.slope
            + breakdown.acceleration * weights.acceleration
            + breakdown.consistency * weights.consistency
            + breakdown.breadth * weights.breadth)
            .clamp(0.0, 100.0);

        let classification = self.classify(score, slope_per_day, window);

        TrendScoreResult {
            query_id,
            window,
            score,
            classification,
            breakdown,
            slope_per_day,
            point_count: series.len(),
            calculated_at: Utc::now(),
        }
    }

    /// Maps a composite score to a regime; boundaries belong to the higher class
    ///
    /// A series falling by more than the decline tolerance over the window is
    /// declining whatever its composite.
    pub fn classify(
        &self,
        score: f64,
        slope_per_day: f64,
        window: TimeWindow,
    ) -> TrendClassification {
        let projected_change = slope_per_day * window.days() as f64;
        if projected_change < -self.config.decline_tolerance {
            return TrendClassification::Declining;
        }

        if score >= BREAKOUT_THRESHOLD && slope_per_day > 0.0 {
            TrendClassification::Breakout
        } else if score >= GROWING_THRESHOLD {
            TrendClassification::Growing
        } else if score >= STABLE_THRESHOLD {
            TrendClassification::Stable
        } else {
            TrendClassification::Declining
        }
    }
}

/// Ordinary least squares slope of y over x
fn least_squares_slope(points: &[(f64, f64)]) -> f64 {
    let n = points.len() as f64;
    if points.len() < 2 {
        return 0.0;
    }
    let x_mean = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (x, y) in points {
        num += (x - x_mean) * (y - y_mean);
        den += (x - x_mean) * (x - x_mean);
    }
    if den.abs() < 1e-12 {
        return 0.0;
    }
    num / den
}

fn slope_score(slope_per_day: f64, window_days: f64, full_scale: f64) -> f64 {
    (100.0 * slope_per_day * window_days / full_scale).clamp(0.0, 100.0)
}

/// Change of slope between the first and second half, centred on 50
fn acceleration_score(points: &[(f64, f64)], window_days: f64, full_scale: f64) -> f64 {
    let n = points.len();
    // Odd lengths share the middle point between halves
    let first = &points[..(n + 1) / 2];
    let second = &points[n / 2..];

    let delta = (least_squares_slope(second) - least_squares_slope(first)) * window_days;
    (50.0 + 50.0 * delta / full_scale).clamp(0.0, 100.0)
}

/// Spread of values around the fitted trend line relative to the mean level
fn consistency_score(points: &[(f64, f64)], slope_per_day: f64) -> f64 {
    let n = points.len() as f64;
    let x_mean = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    if y_mean <= 0.0 {
        return 0.0;
    }

    let intercept = y_mean - slope_per_day * x_mean;
    let residual_ss: f64 = points
        .iter()
        .map(|(x, y)| {
            let residual = y - (intercept + slope_per_day * x);
            residual * residual
        })
        .sum();
    let variance = residual_ss / (n - 1.0);
    let coefficient_of_variation = variance.sqrt() / y_mean;

    (100.0 * (1.0 - coefficient_of_variation)).clamp(0.0, 100.0)
}

/// Share of sampled sub-periods whose mean interest is above the floor
fn breadth_score(points: &[(f64, f64)], sub_period_days: i64, floor: f64) -> f64 {
    let mut periods: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for (x, y) in points {
        let period = (*x as i64).div_euclid(sub_period_days);
        let entry = periods.entry(period).or_insert((0.0, 0));
        entry.0 += y;
        entry.1 += 1;
    }

    if periods.is_empty() {
        return 0.0;
    }

    let above = periods
        .values()
        .filter(|(sum, count)| sum / *count as f64 > floor)
        .count();

    100.0 * above as f64 / periods.len() as f64
}
