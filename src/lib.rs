//! Trend Opportunity Scoring and clustering core
//!
//! Turns interest-over-time samples into ranked, classified and grouped search
//! queries. Storage and every third-party integration sit behind
//! [`db::TrendRepository`], which callers implement and inject.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use services::OpportunityEngine;
