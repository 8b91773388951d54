use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::IntentType;

/// A group of topically related queries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpportunityCluster {
    pub id: Uuid,
    pub name: String,
    /// Most common intent among members, None when no member has been classified
    pub intent_type: Option<IntentType>,
    pub average_score: f64,
    /// Member query ids in ascending order
    pub queries: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl OpportunityCluster {
    pub fn contains(&self, query_id: &Uuid) -> bool {
        self.queries.binary_search(query_id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}
