pub mod clustering;
pub mod engine;
pub mod normalizer;
pub mod ranker;
pub mod scorer;

pub use clustering::{ClusterSignals, Clusterer};
pub use engine::OpportunityEngine;
pub use normalizer::normalize;
pub use ranker::OpportunityRanker;
pub use scorer::TrendScorer;
