//! Document Replicator (§4.4): per-collection incremental copy from primary
//! to standby, driven by the forward watermark, with duplicate suppression.

use chrono::Utc;

use crate::error::EngineResult;
use crate::events::{Event, EventBus};
use crate::gateway::traits::{DbGateway, BATCH_WRITE_LIMIT};
use crate::gateway::types::{DocumentRecord, Side};
use crate::observability::Logger;

use super::watermark::{Direction, WatermarkStore};

/// Number of documents pulled and compared per chunk (`BATCH_SIZE`, §4.4
/// step 3, default 100 — distinct from the 450-op write commit cap).
pub const READ_CHUNK_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationMode {
    Incremental,
    Full,
}

/// Result of one `ReplicateCollection` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationOutcome {
    pub written_count: usize,
    pub duplicates_skipped: usize,
    pub errors: usize,
}

/// Runs the algorithm in §4.4 for a single collection, forward direction
/// (primary -> standby).
pub async fn replicate_collection(
    gateway: &dyn DbGateway,
    watermarks: &mut WatermarkStore,
    events: &EventBus,
    collection: &str,
    mode: ReplicationMode,
    read_chunk_size: usize,
) -> EngineResult<ReplicationOutcome> {
    let since = match mode {
        ReplicationMode::Incremental => watermarks.get(collection, Direction::Forward).map(str::to_string),
        ReplicationMode::Full => None,
    };

    let docs = gateway.scan_since(Side::Primary, collection, since.as_deref()).await?;
    let total = docs.len();

    if docs.is_empty() {
        emit_completed(events, collection, 0, matches!(mode, ReplicationMode::Incremental));
        return Ok(ReplicationOutcome::default());
    }

    let mut outcome = ReplicationOutcome::default();
    let mut pending: Vec<(String, serde_json::Value)> = Vec::new();
    let mut pending_high_watermark: Option<String> = None;
    let mut committed_high_watermark: Option<String> = None;
    let mut committed_so_far = 0usize;

    for chunk in docs.chunks(read_chunk_size.max(1)) {
        let ids: Vec<String> = chunk.iter().map(|d| d.id.clone()).collect();
        let targets = gateway.multi_get(Side::Standby, collection, &ids).await?;

        for doc in chunk {
            if should_write(doc, targets.get(&doc.id)) {
                pending.push((doc.id.clone(), doc.data.clone()));
                if let Some(ts) = doc.effective_timestamp() {
                    bump_high_watermark(&mut pending_high_watermark, ts);
                }
            } else {
                outcome.duplicates_skipped += 1;
            }

            if pending.len() >= BATCH_WRITE_LIMIT {
                commit_pending(
                    gateway,
                    collection,
                    &mut pending,
                    &mut pending_high_watermark,
                    &mut committed_high_watermark,
                    &mut outcome,
                    &mut committed_so_far,
                    total,
                    events,
                )
                .await;
            }
        }
    }

    if !pending.is_empty() {
        commit_pending(
            gateway,
            collection,
            &mut pending,
            &mut pending_high_watermark,
            &mut committed_high_watermark,
            &mut outcome,
            &mut committed_so_far,
            total,
            events,
        )
        .await;
    }

    if let Some(new_watermark) = committed_high_watermark {
        watermarks.advance(collection, Direction::Forward, &new_watermark);
    }

    emit_completed(events, collection, outcome.written_count, matches!(mode, ReplicationMode::Incremental));

    Ok(outcome)
}

/// §4.4 step 3b: write unless the target already has a timestamp at least
/// as new as the source's. Direction-agnostic — recovery (§4.5) reuses it
/// for the reverse comparison.
pub(super) fn should_write(src: &DocumentRecord, target: Option<&DocumentRecord>) -> bool {
    let Some(target) = target else {
        return true;
    };
    match (src.effective_timestamp(), target.effective_timestamp()) {
        (Some(src_ts), Some(target_ts)) => target_ts < src_ts,
        // Source with no timestamp is "always newer than target" (§3).
        (None, _) => true,
        // Target with no timestamp never blocks a timestamped source write.
        (Some(_), None) => true,
    }
}

fn bump_high_watermark(current: &mut Option<String>, candidate: &str) {
    let replace = match current {
        Some(existing) => candidate > existing.as_str(),
        None => true,
    };
    if replace {
        *current = Some(candidate.to_string());
    }
}

#[allow(clippy::too_many_arguments)]
async fn commit_pending(
    gateway: &dyn DbGateway,
    collection: &str,
    pending: &mut Vec<(String, serde_json::Value)>,
    pending_high_watermark: &mut Option<String>,
    committed_high_watermark: &mut Option<String>,
    outcome: &mut ReplicationOutcome,
    committed_so_far: &mut usize,
    total: usize,
    events: &EventBus,
) {
    let batch_len = pending.len();
    match gateway.batch_write(Side::Standby, collection, pending.as_slice()).await {
        Ok(()) => {
            outcome.written_count += batch_len;
            *committed_so_far += batch_len;
            if let Some(candidate) = pending_high_watermark.take() {
                bump_high_watermark(committed_high_watermark, &candidate);
            }
            events.publish(Event::CollectionProgress {
                collection: collection.to_string(),
                written_so_far: *committed_so_far,
                of_total: total,
                phase: "writing",
            });
        }
        Err(err) => {
            outcome.errors += batch_len;
            let batch_len_str = batch_len.to_string();
            let reason = err.to_string();
            Logger::error(
                "batchCommitFailed",
                &[("collection", collection), ("batchSize", batch_len_str.as_str()), ("reason", reason.as_str())],
            );
            // Per §4.4: a failed batch's high watermark is NOT folded in.
            *pending_high_watermark = None;
        }
    }
    pending.clear();
}

fn emit_completed(events: &EventBus, collection: &str, written_count: usize, incremental: bool) {
    events.publish(Event::CollectionCompleted {
        collection: collection.to_string(),
        written_count,
        incremental,
        timestamp: Utc::now(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::MemoryGateway;
    use serde_json::json;

    fn watermark_after(store: &WatermarkStore, collection: &str) -> Option<String> {
        store.get(collection, Direction::Forward).map(str::to_string)
    }

    #[tokio::test]
    async fn fresh_bring_up_writes_all_documents() {
        let gw = MemoryGateway::new();
        gw.seed_document(Side::Primary, "appointments", "a1", json!({"updatedAt": "2024-01-01T00:00:01Z"}));
        gw.seed_document(Side::Primary, "appointments", "a2", json!({"updatedAt": "2024-01-01T00:00:02Z"}));
        gw.seed_document(Side::Primary, "appointments", "a3", json!({"updatedAt": "2024-01-01T00:00:03Z"}));

        let mut watermarks = WatermarkStore::new();
        let events = EventBus::new(64);

        let outcome = replicate_collection(
            &gw,
            &mut watermarks,
            &events,
            "appointments",
            ReplicationMode::Incremental,
            READ_CHUNK_SIZE,
        )
        .await
        .unwrap();

        assert_eq!(outcome.written_count, 3);
        assert_eq!(outcome.duplicates_skipped, 0);

        for id in ["a1", "a2", "a3"] {
            assert!(gw.get_document(Side::Standby, "appointments", id).is_some());
        }
    }

    #[tokio::test]
    async fn incremental_rerun_with_no_changes_skips_via_watermark() {
        let gw = MemoryGateway::new();
        gw.seed_document(Side::Primary, "appointments", "a1", json!({"updatedAt": "2024-01-01T00:00:01Z"}));

        let mut watermarks = WatermarkStore::new();
        let events = EventBus::new(64);

        replicate_collection(&gw, &mut watermarks, &events, "appointments", ReplicationMode::Incremental, READ_CHUNK_SIZE)
            .await
            .unwrap();
        watermarks.advance("appointments", Direction::Forward, "2024-01-01T00:00:01Z");

        let second = replicate_collection(&gw, &mut watermarks, &events, "appointments", ReplicationMode::Incremental, READ_CHUNK_SIZE)
            .await
            .unwrap();

        assert_eq!(second.written_count, 0);
        assert_eq!(second.duplicates_skipped, 0);
    }

    #[tokio::test]
    async fn update_propagation_writes_exactly_changed_doc() {
        let gw = MemoryGateway::new();
        gw.seed_document(Side::Primary, "appointments", "a1", json!({"updatedAt": "2024-01-01T00:00:01Z"}));
        gw.seed_document(Side::Primary, "appointments", "a2", json!({"updatedAt": "2024-01-01T00:00:02Z"}));
        gw.seed_document(Side::Standby, "appointments", "a1", json!({"updatedAt": "2024-01-01T00:00:01Z"}));
        gw.seed_document(Side::Standby, "appointments", "a2", json!({"updatedAt": "2024-01-01T00:00:02Z"}));

        let mut watermarks = WatermarkStore::new();
        watermarks.advance("appointments", Direction::Forward, "2024-01-01T00:00:02Z");
        gw.seed_document(Side::Primary, "appointments", "a2", json!({"updatedAt": "2024-01-02T00:00:00Z"}));

        let events = EventBus::new(64);
        let outcome = replicate_collection(&gw, &mut watermarks, &events, "appointments", ReplicationMode::Incremental, READ_CHUNK_SIZE)
            .await
            .unwrap();

        assert_eq!(outcome.written_count, 1);
        assert_eq!(watermark_after(&watermarks, "appointments"), Some("2024-01-02T00:00:00Z".to_string()));
    }

    #[tokio::test]
    async fn target_newer_or_equal_is_duplicate_skipped() {
        let gw = MemoryGateway::new();
        gw.seed_document(Side::Primary, "c", "a1", json!({"updatedAt": "2024-01-01T00:00:00Z"}));
        gw.seed_document(Side::Standby, "c", "a1", json!({"updatedAt": "2024-01-01T00:00:00Z"}));

        let mut watermarks = WatermarkStore::new();
        let events = EventBus::new(64);
        let outcome = replicate_collection(&gw, &mut watermarks, &events, "c", ReplicationMode::Full, READ_CHUNK_SIZE)
            .await
            .unwrap();

        assert_eq!(outcome.written_count, 0);
        assert_eq!(outcome.duplicates_skipped, 1);
    }

    #[tokio::test]
    async fn doc_without_updated_at_always_overwrites_and_does_not_advance_watermark() {
        let gw = MemoryGateway::new();
        gw.seed_document(Side::Primary, "c", "a1", json!({"name": "no ts"}));
        gw.seed_document(Side::Standby, "c", "a1", json!({"updatedAt": "2024-01-01T00:00:00Z"}));

        let mut watermarks = WatermarkStore::new();
        let events = EventBus::new(64);
        let outcome = replicate_collection(&gw, &mut watermarks, &events, "c", ReplicationMode::Full, READ_CHUNK_SIZE)
            .await
            .unwrap();

        assert_eq!(outcome.written_count, 1);
        assert_eq!(watermark_after(&watermarks, "c"), None);
    }

    #[tokio::test]
    async fn empty_collection_is_a_no_op() {
        let gw = MemoryGateway::new();
        let mut watermarks = WatermarkStore::new();
        let events = EventBus::new(64);

        let outcome = replicate_collection(&gw, &mut watermarks, &events, "ghost", ReplicationMode::Full, READ_CHUNK_SIZE)
            .await
            .unwrap();

        assert_eq!(outcome, ReplicationOutcome::default());
        assert_eq!(watermark_after(&watermarks, "ghost"), None);
    }

    #[tokio::test]
    async fn exactly_450_pending_writes_is_one_commit_451_is_two() {
        let gw = MemoryGateway::new();
        for i in 0..450 {
            gw.seed_document(Side::Primary, "c450", &format!("id{i}"), json!({"updatedAt": format!("2024-01-01T00:{:02}:{:02}Z", i / 60, i % 60)}));
        }
        let mut watermarks = WatermarkStore::new();
        let events = EventBus::new(4096);
        let mut sub = events.subscribe();

        replicate_collection(&gw, &mut watermarks, &events, "c450", ReplicationMode::Full, 450)
            .await
            .unwrap();

        let mut progress_events = 0;
        while let Ok(Some(event)) = tokio::time::timeout(std::time::Duration::from_millis(20), sub.recv()).await {
            if matches!(event, Event::CollectionProgress { .. }) {
                progress_events += 1;
            }
        }
        assert_eq!(progress_events, 1);

        let gw451 = MemoryGateway::new();
        for i in 0..451 {
            gw451.seed_document(Side::Primary, "c451", &format!("id{i}"), json!({"updatedAt": format!("2024-01-01T00:{:02}:{:02}Z", i / 60, i % 60)}));
        }
        let mut watermarks451 = WatermarkStore::new();
        let events451 = EventBus::new(4096);
        let mut sub451 = events451.subscribe();

        replicate_collection(&gw451, &mut watermarks451, &events451, "c451", ReplicationMode::Full, 451)
            .await
            .unwrap();

        let mut progress_events_451 = 0;
        while let Ok(Some(event)) = tokio::time::timeout(std::time::Duration::from_millis(20), sub451.recv()).await {
            if matches!(event, Event::CollectionProgress { .. }) {
                progress_events_451 += 1;
            }
        }
        assert_eq!(progress_events_451, 2);
    }
}
