use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tracked search query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Query {
    /// Unique identifier for the query
    pub id: Uuid,
    /// Search text as entered, never modified after creation
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Query {
    /// Creates a new query with a fresh identifier
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// Why a user issues a query
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IntentType {
    /// Describes a problem the searcher is having
    Pain,
    /// Looking for a product or tool
    Tool,
    /// Moving from one way of working to another
    Transition,
    /// Trying to learn something
    Education,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_new_assigns_unique_ids() {
        let a = Query::new("best crm software");
        let b = Query::new("best crm software");
        assert_ne!(a.id, b.id);
        assert_eq!(a.text, "best crm software");
    }

    #[test]
    fn test_intent_type_serde() {
        let json = serde_json::to_string(&IntentType::Transition).unwrap();
        assert_eq!(json, r#""transition""#);

        let deserialized: IntentType = serde_json::from_str(r#""pain""#).unwrap();
        assert_eq!(deserialized, IntentType::Pain);
    }
}
