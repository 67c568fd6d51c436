use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The value propagated along wires. Nodes may mutate a message in place or
/// construct derived messages; the engine attaches no identity beyond content.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkflowMessage {
    #[serde(default)]
    pub payload: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowMessage {
    /// An empty message: null payload, no metadata. Used to kick off
    /// trigger/inject entry points.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_payload(payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
            ..Self::default()
        }
    }

    /// New message carrying `payload`, with this message's metadata forwarded.
    pub fn derived(&self, payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
            metadata: self.metadata.clone(),
            error: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derived_keeps_metadata_and_drops_error() {
        let mut msg = WorkflowMessage::with_payload(json!({"value": 1}))
            .with_metadata("source", "test");
        msg.error = Some("boom".to_string());

        let next = msg.derived(json!([1, 2, 3]));
        assert_eq!(next.payload, json!([1, 2, 3]));
        assert_eq!(next.metadata_value("source"), Some(&json!("test")));
        assert!(next.error.is_none());
    }

    #[test]
    fn empty_message_round_trips() {
        let msg = WorkflowMessage::empty();
        let text = serde_json::to_string(&msg).unwrap();
        let back: WorkflowMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(msg, back);
    }
}
