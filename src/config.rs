use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::TimeWindow;

/// Mean interest a sub-period must exceed to count toward breadth
pub const DEFAULT_BREADTH_FLOOR: f64 = 20.0;

/// Projected fall across the window (interest points) beyond which a series is declining
pub const DEFAULT_DECLINE_TOLERANCE: f64 = 10.0;

/// Jaccard similarity at which two queries are linked
pub const DEFAULT_CLUSTER_THRESHOLD: f64 = 0.3;

/// Longest cluster name derived from a member query
pub const DEFAULT_CLUSTER_NAME_MAX_CHARS: usize = 60;

/// Share of the opportunity score carried by momentum
pub const DEFAULT_MOMENTUM_WEIGHT: f64 = 0.5;

/// Share of the opportunity score carried by demand
pub const DEFAULT_DEMAND_WEIGHT: f64 = 0.25;

/// Share of the opportunity score carried by efficiency
pub const DEFAULT_EFFICIENCY_WEIGHT: f64 = 0.25;

/// Monthly search volume that earns a full demand score
pub const DEFAULT_DEMAND_SATURATION: f64 = 100_000.0;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Window for `score_many_with_defaults`
    #[serde(default = "default_window")]
    pub default_window: TimeWindow,

    #[serde(default = "default_breadth_floor")]
    pub breadth_floor: f64,

    #[serde(default = "default_decline_tolerance")]
    pub decline_tolerance: f64,

    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold: f64,

    /// Window whose scores feed cluster averages and names
    #[serde(default = "default_window")]
    pub cluster_reference_window: TimeWindow,

    #[serde(default = "default_cluster_name_max_chars")]
    pub cluster_name_max_chars: usize,

    /// Window whose scores feed the momentum column when ranking
    #[serde(default = "default_window")]
    pub rank_window: TimeWindow,

    #[serde(default = "default_momentum_weight")]
    pub rank_momentum_weight: f64,

    #[serde(default = "default_demand_weight")]
    pub rank_demand_weight: f64,

    #[serde(default = "default_efficiency_weight")]
    pub rank_efficiency_weight: f64,

    #[serde(default = "default_demand_saturation")]
    pub demand_saturation: f64,

    /// tracing filter directive, overridden by RUST_LOG when set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_window() -> TimeWindow {
    TimeWindow::NinetyDays
}

fn default_breadth_floor() -> f64 {
    DEFAULT_BREADTH_FLOOR
}

fn default_decline_tolerance() -> f64 {
    DEFAULT_DECLINE_TOLERANCE
}

fn default_cluster_threshold() -> f64 {
    DEFAULT_CLUSTER_THRESHOLD
}

fn default_cluster_name_max_chars() -> usize {
    DEFAULT_CLUSTER_NAME_MAX_CHARS
}

fn default_momentum_weight() -> f64 {
    DEFAULT_MOMENTUM_WEIGHT
}

fn default_demand_weight() -> f64 {
    DEFAULT_DEMAND_WEIGHT
}

fn default_efficiency_weight() -> f64 {
    DEFAULT_EFFICIENCY_WEIGHT
}

fn default_demand_saturation() -> f64 {
    DEFAULT_DEMAND_SATURATION
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Tunables for the TOS scorer
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub breadth_floor: f64,
    pub decline_tolerance: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            breadth_floor: DEFAULT_BREADTH_FLOOR,
            decline_tolerance: DEFAULT_DECLINE_TOLERANCE,
        }
    }
}

/// Tunables for the clustering engine
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringConfig {
    pub threshold: f64,
    pub reference_window: TimeWindow,
    pub name_max_chars: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CLUSTER_THRESHOLD,
            reference_window: default_window(),
            name_max_chars: DEFAULT_CLUSTER_NAME_MAX_CHARS,
        }
    }
}

/// Tunables for the opportunity ranker
#[derive(Debug, Clone, PartialEq)]
pub struct RankingConfig {
    pub window: TimeWindow,
    pub momentum_weight: f64,
    pub demand_weight: f64,
    pub efficiency_weight: f64,
    pub demand_saturation: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            momentum_weight: DEFAULT_MOMENTUM_WEIGHT,
            demand_weight: DEFAULT_DEMAND_WEIGHT,
            efficiency_weight: DEFAULT_EFFICIENCY_WEIGHT,
            demand_saturation: DEFAULT_DEMAND_SATURATION,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_window: default_window(),
            breadth_floor: DEFAULT_BREADTH_FLOOR,
            decline_tolerance: DEFAULT_DECLINE_TOLERANCE,
            cluster_threshold: DEFAULT_CLUSTER_THRESHOLD,
            cluster_reference_window: default_window(),
            cluster_name_max_chars: DEFAULT_CLUSTER_NAME_MAX_CHARS,
            rank_window: default_window(),
            rank_momentum_weight: DEFAULT_MOMENTUM_WEIGHT,
            rank_demand_weight: DEFAULT_DEMAND_WEIGHT,
            rank_efficiency_weight: DEFAULT_EFFICIENCY_WEIGHT,
            demand_saturation: DEFAULT_DEMAND_SATURATION,
            log_filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from explicit key/value pairs
    pub fn from_pairs<I>(pairs: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, Config>(pairs)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects thresholds and weights the components cannot work with
    pub fn validate(&self) -> AppResult<()> {
        if !(0.0..=1.0).contains(&self.cluster_threshold) {
            return Err(AppError::InvalidArgument(format!(
                "cluster_threshold must be within [0, 1], got {}",
                self.cluster_threshold
            )));
        }

        if !self.breadth_floor.is_finite() || !(0.0..=100.0).contains(&self.breadth_floor) {
            return Err(AppError::InvalidArgument(format!(
                "breadth_floor must be within [0, 100], got {}",
                self.breadth_floor
            )));
        }

        if !self.decline_tolerance.is_finite() || self.decline_tolerance < 0.0 {
            return Err(AppError::InvalidArgument(format!(
                "decline_tolerance must be non-negative, got {}",
                self.decline_tolerance
            )));
        }

        let weights = [
            self.rank_momentum_weight,
            self.rank_demand_weight,
            self.rank_efficiency_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AppError::InvalidArgument(
                "ranking weights must be non-negative".to_string(),
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(AppError::InvalidArgument(
                "ranking weights must not all be zero".to_string(),
            ));
        }

        if !self.demand_saturation.is_finite() || self.demand_saturation <= 1.0 {
            return Err(AppError::InvalidArgument(format!(
                "demand_saturation must be greater than 1, got {}",
                self.demand_saturation
            )));
        }

        if self.cluster_name_max_chars == 0 {
            return Err(AppError::InvalidArgument(
                "cluster_name_max_chars must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn scoring(&self) -> ScoringConfig {
        ScoringConfig {
            breadth_floor: self.breadth_floor,
            decline_tolerance: self.decline_tolerance,
        }
    }

    pub fn clustering(&self) -> ClusteringConfig {
        ClusteringConfig {
            threshold: self.cluster_threshold,
            reference_window: self.cluster_reference_window,
            name_max_chars: self.cluster_name_max_chars,
        }
    }

    pub fn ranking(&self) -> RankingConfig {
        RankingConfig {
            window: self.rank_window,
            momentum_weight: self.rank_momentum_weight,
            demand_weight: self.rank_demand_weight,
            efficiency_weight: self.rank_efficiency_weight,
            demand_saturation: self.demand_saturation,
        }
    }
}
