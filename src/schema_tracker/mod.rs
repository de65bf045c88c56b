//! Schema Tracker (§4.3): samples a handful of documents per collection and
//! maintains the monotonically-growing set of observed dotted key paths.
//!
//! Purely observational — the replicator never consults this to decide
//! whether to write a document.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde_json::Value;

use crate::events::{Event, EventBus};
use crate::gateway::types::DocumentRecord;

/// Number of documents sampled per collection per refresh (§4.3).
pub const SAMPLE_SIZE: usize = 5;

/// Tracks the observed `SchemaSet` for every collection the engine has seen.
#[derive(Default)]
pub struct SchemaTracker {
    schemas: RwLock<HashMap<String, HashSet<String>>>,
}

impl SchemaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples up to [`SAMPLE_SIZE`] documents, computes their dotted key
    /// paths, and diffs against the stored set for `collection`. Additions
    /// publish a `schemaChange` event; removals are never reported (schema
    /// only grows within a process lifetime).
    pub fn observe(&self, collection: &str, docs: &[DocumentRecord], events: &EventBus) {
        let sample = docs.iter().take(SAMPLE_SIZE);
        let mut observed_keys = HashSet::new();
        for doc in sample {
            collect_dotted_keys(&doc.data, "", &mut observed_keys);
        }

        let mut schemas = self.schemas.write().unwrap();
        let existing = schemas.entry(collection.to_string()).or_default();

        let new_keys: Vec<String> = observed_keys.difference(existing).cloned().collect();
        if new_keys.is_empty() {
            return;
        }

        for key in &new_keys {
            existing.insert(key.clone());
        }
        let total_keys = existing.len();

        events.publish(Event::SchemaChange {
            collection: collection.to_string(),
            new_keys,
            total_keys,
        });
    }

    /// Returns the current schema set for `collection`, sorted for stable
    /// presentation.
    pub fn schema_for(&self, collection: &str) -> Vec<String> {
        let schemas = self.schemas.read().unwrap();
        let mut keys: Vec<String> = schemas
            .get(collection)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Resets all tracked schemas (explicit reset only — §3 lifecycle).
    pub fn reset(&self) {
        let mut schemas = self.schemas.write().unwrap();
        schemas.clear();
    }
}

/// Descends into nested JSON objects (not arrays) collecting dotted paths.
fn collect_dotted_keys(value: &Value, prefix: &str, out: &mut HashSet<String>) {
    if let Value::Object(map) = value {
        for (key, inner) in map {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match inner {
                Value::Object(_) => collect_dotted_keys(inner, &path, out),
                _ => {
                    out.insert(path);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(data: Value) -> DocumentRecord {
        DocumentRecord::new("id", data)
    }

    #[tokio::test]
    async fn emits_schema_change_on_new_keys() {
        let tracker = SchemaTracker::new();
        let events = EventBus::new(16);
        let mut sub = events.subscribe();

        tracker.observe(
            "appointments",
            &[doc(json!({"address": {"city": "NYC"}, "age": 5}))],
            &events,
        );

        let event = sub.recv().await.unwrap();
        match event {
            Event::SchemaChange { collection, mut new_keys, total_keys } => {
                new_keys.sort();
                assert_eq!(collection, "appointments");
                assert_eq!(new_keys, vec!["address.city".to_string(), "age".to_string()]);
                assert_eq!(total_keys, 2);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn does_not_descend_into_arrays() {
        let tracker = SchemaTracker::new();
        let events = EventBus::new(16);
        tracker.observe("c", &[doc(json!({"tags": ["a", "b"]}))], &events);

        assert_eq!(tracker.schema_for("c"), vec!["tags".to_string()]);
    }

    #[test]
    fn removals_are_not_reported_schema_only_grows() {
        let tracker = SchemaTracker::new();
        let events = EventBus::new(16);
        tracker.observe("c", &[doc(json!({"a": 1, "b": 2}))], &events);
        tracker.observe("c", &[doc(json!({"a": 1}))], &events);

        assert_eq!(tracker.schema_for("c"), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn no_event_when_no_new_keys() {
        let tracker = SchemaTracker::new();
        let events = EventBus::new(16);
        let mut sub = events.subscribe();

        tracker.observe("c", &[doc(json!({"a": 1}))], &events);
        sub.recv().await.unwrap(); // the first observation's schemaChange

        tracker.observe("c", &[doc(json!({"a": 2}))], &events);
        let second = tokio::time::timeout(std::time::Duration::from_millis(50), sub.recv()).await;
        assert!(second.is_err(), "no second schemaChange expected");
    }

    #[test]
    fn reset_clears_all_schemas() {
        let tracker = SchemaTracker::new();
        let events = EventBus::new(16);
        tracker.observe("c", &[doc(json!({"a": 1}))], &events);
        tracker.reset();
        assert!(tracker.schema_for("c").is_empty());
    }
}
