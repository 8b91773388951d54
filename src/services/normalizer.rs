use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{RawPoint, TimeWindow, TrendPoint},
};

/// Fewest points a series needs before a slope can be fitted
pub const MIN_SERIES_POINTS: usize = 2;

/// Turns raw interest samples into a clean series for one window
///
/// Output is strictly increasing by date with one point per calendar date. When a
/// date appears more than once the latest capture wins; captures without a
/// timestamp lose to timestamped ones and otherwise fall back to input order.
/// Points older than the window, measured back from the newest date, are dropped.
/// Missing dates are left missing.
pub fn normalize(raw_points: &[RawPoint], window: TimeWindow) -> AppResult<Vec<TrendPoint>> {
    // date -> (captured_at, input position, value)
    let mut by_date: BTreeMap<NaiveDate, (Option<DateTime<Utc>>, usize, f64)> = BTreeMap::new();

    for (position, point) in raw_points.iter().enumerate() {
        let candidate = (point.captured_at, position, clamp_interest(point.value));
        by_date
            .entry(point.date)
            .and_modify(|current| {
                if (candidate.0, candidate.1) >= (current.0, current.1) {
                    *current = candidate;
                }
            })
            .or_insert(candidate);
    }

    let Some(latest) = by_date.keys().next_back().copied() else {
        return Err(AppError::InvalidInput("series has no points".to_string()));
    };

    // Window of N days covers the latest date and the N - 1 days before it;
    // nothing to clip when that reaches past the earliest representable date
    let in_window = match latest.checked_sub_signed(Duration::days(window.days() - 1)) {
        Some(earliest) => by_date.range(earliest..),
        None => by_date.range(..),
    };

    let series: Vec<TrendPoint> = in_window
        .map(|(date, (_, _, value))| TrendPoint {
            date: *date,
            value: *value,
        })
        .collect();

    if series.len() < MIN_SERIES_POINTS {
        return Err(AppError::InvalidInput(format!(
            "series needs at least {} distinct dates within {}, got {}",
            MIN_SERIES_POINTS,
            window,
            series.len()
        )));
    }

    Ok(series)
}

fn clamp_interest(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
