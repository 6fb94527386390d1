use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Where a user-visible error came from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ErrorOrigin {
    Graphql,
    Network,
}

impl ErrorOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorOrigin::Graphql => "graphql",
            ErrorOrigin::Network => "network",
        }
    }
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error queued for the presenter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub id: Uuid,
    pub origin: ErrorOrigin,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        ErrorRecord {
            id: Uuid::new_v4(),
            origin,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn graphql(message: impl Into<String>) -> Self {
        Self::new(ErrorOrigin::Graphql, message)
    }

    /// Network records carry a prefix so the presenter can tell them apart.
    pub fn network(message: impl fmt::Display) -> Self {
        Self::new(ErrorOrigin::Network, format!("[Network error]: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_record_keeps_message() {
        let record = ErrorRecord::graphql("Not found");
        assert_eq!(record.origin, ErrorOrigin::Graphql);
        assert_eq!(record.message, "Not found");
    }

    #[test]
    fn test_network_record_is_prefixed() {
        let record = ErrorRecord::network("connection refused");
        assert_eq!(record.origin, ErrorOrigin::Network);
        assert_eq!(record.message, "[Network error]: connection refused");
    }

    #[test]
    fn test_origin_serializes_lowercase() {
        let json = serde_json::to_string(&ErrorOrigin::Graphql).unwrap();
        assert_eq!(json, "\"graphql\"");
        assert_eq!(ErrorOrigin::Network.to_string(), "network");
    }
}
