//! Per-(collection, direction) watermarks (§3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Direction a watermark applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Recover,
}

/// The pair of watermarks tracked for one collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CollectionWatermark {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recover: Option<String>,
}

/// All watermarks, keyed by collection name. Lives for the process; the
/// Coordinator persists and restores it alongside `RunCounters`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WatermarkStore {
    #[serde(flatten)]
    collections: HashMap<String, CollectionWatermark>,
}

impl WatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, collection: &str, direction: Direction) -> Option<&str> {
        let entry = self.collections.get(collection)?;
        match direction {
            Direction::Forward => entry.forward.as_deref(),
            Direction::Recover => entry.recover.as_deref(),
        }
    }

    /// Advances the watermark for `collection`/`direction` to `candidate` if
    /// it is strictly greater than the stored value (monotonic — §3
    /// invariant: "never moves backward except on explicit reset").
    pub fn advance(&mut self, collection: &str, direction: Direction, candidate: &str) {
        let entry = self.collections.entry(collection.to_string()).or_default();
        let slot = match direction {
            Direction::Forward => &mut entry.forward,
            Direction::Recover => &mut entry.recover,
        };
        match slot {
            Some(current) if current.as_str() >= candidate => {}
            _ => *slot = Some(candidate.to_string()),
        }
    }

    /// Clears every forward watermark (used by `ForceFull`). Recover
    /// watermarks are untouched.
    pub fn reset_forward_all(&mut self) {
        for entry in self.collections.values_mut() {
            entry.forward = None;
        }
    }

    /// Clears all watermarks unconditionally (full reset).
    pub fn reset_all(&mut self) {
        self.collections.clear();
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }
}
