use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CoreError;

fn default_event_version() -> String {
    "1.0".to_string()
}

/// Common wire envelope wrapping every event published onto the bus.
/// `eventId` doubles as the consumer framework's dedupe key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: String,
    pub event_type: String,
    #[serde(default = "default_event_version")]
    pub event_version: String,
    pub timestamp: i64,
    pub source: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,
    pub data: Value,
    #[serde(default)]
    pub metadata: Value,
}

impl EventEnvelope {
    pub fn new(event_type: impl Into<String>, source: impl Into<String>, user_id: impl Into<String>, data: Value) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            event_version: default_event_version(),
            timestamp: Utc::now().timestamp_millis(),
            source: source.into(),
            user_id: user_id.into(),
            correlation_id: None,
            causation_id: None,
            data,
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_causation_id(mut self, causation_id: impl Into<String>) -> Self {
        self.causation_id = Some(causation_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Parse a single envelope from JSON, treating any decode failure as
    /// permanent — malformed payloads are never retried.
    pub fn from_json(value: &Value) -> Result<Self, CoreError> {
        serde_json::from_value(value.clone())
            .map_err(|err| CoreError::permanent_decode(format!("invalid event envelope: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_version_defaults_to_one_point_zero() {
        let value = json!({
            "eventId": "11111111-1111-1111-1111-111111111111",
            "eventType": "file.processed",
            "timestamp": 1_700_000_000_000i64,
            "source": "ingestion",
            "userId": "user-1",
            "data": {}
        });
        let envelope = EventEnvelope::from_json(&value).unwrap();
        assert_eq!(envelope.event_version, "1.0");
    }

    #[test]
    fn missing_required_field_is_permanent_decode() {
        let value = json!({ "eventType": "file.processed" });
        let err = EventEnvelope::from_json(&value).unwrap_err();
        assert!(err.is_permanent());
    }
}
