//! Recovery Replicator (§4.5): runs the mirror image of forward replication
//! — standby to primary — driven by the `recover` watermark. Upsert-merge
//! only, never deletes, and the newer `updatedAt` always wins regardless of
//! direction.

use chrono::Utc;

use crate::error::EngineResult;
use crate::events::{Event, EventBus};
use crate::gateway::traits::{DbGateway, BATCH_WRITE_LIMIT};
use crate::gateway::types::Side;

use super::replicator::{should_write, READ_CHUNK_SIZE};
use super::watermark::{Direction, WatermarkStore};

/// Result of one `RecoverCollection` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryOutcome {
    pub written_count: usize,
    pub duplicates_skipped: usize,
    pub errors: usize,
}

/// Runs the algorithm in §4.5 for a single collection, reverse direction
/// (standby -> primary). Always incremental against the `recover` watermark
/// — there is no "full recover" mode, matching §4.5's description of a
/// bounded catch-up pass rather than a full reseed.
pub async fn recover_collection(
    gateway: &dyn DbGateway,
    watermarks: &mut WatermarkStore,
    events: &EventBus,
    collection: &str,
) -> EngineResult<RecoveryOutcome> {
    let since = watermarks.get(collection, Direction::Recover).map(str::to_string);

    let docs = gateway.scan_since(Side::Standby, collection, since.as_deref()).await?;
    let total = docs.len();

    if docs.is_empty() {
        emit_recovered(events, collection, 0);
        return Ok(RecoveryOutcome::default());
    }

    let mut outcome = RecoveryOutcome::default();
    let mut pending: Vec<(String, serde_json::Value)> = Vec::new();
    let mut pending_high_watermark: Option<String> = None;
    let mut committed_high_watermark: Option<String> = None;
    let mut committed_so_far = 0usize;

    for chunk in docs.chunks(READ_CHUNK_SIZE) {
        let ids: Vec<String> = chunk.iter().map(|d| d.id.clone()).collect();
        let targets = gateway.multi_get(Side::Primary, collection, &ids).await?;

        for doc in chunk {
            if should_write(doc, targets.get(&doc.id)) {
                pending.push((doc.id.clone(), doc.data.clone()));
                if let Some(ts) = doc.effective_timestamp() {
                    bump(&mut pending_high_watermark, ts);
                }
            } else {
                outcome.duplicates_skipped += 1;
            }

            if pending.len() >= BATCH_WRITE_LIMIT {
                commit(
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
        commit(
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
        watermarks.advance(collection, Direction::Recover, &new_watermark);
    }

    emit_recovered(events, collection, outcome.written_count);

    Ok(outcome)
}

fn bump(current: &mut Option<String>, candidate: &str) {
    let replace = match current {
        Some(existing) => candidate > existing.as_str(),
        None => true,
    };
    if replace {
        *current = Some(candidate.to_string());
    }
}

#[allow(clippy::too_many_arguments)]
async fn commit(
    gateway: &dyn DbGateway,
    collection: &str,
    pending: &mut Vec<(String, serde_json::Value)>,
    pending_high_watermark: &mut Option<String>,
    committed_high_watermark: &mut Option<String>,
    outcome: &mut RecoveryOutcome,
    committed_so_far: &mut usize,
    total: usize,
    events: &EventBus,
) {
    let batch_len = pending.len();
    match gateway.batch_write(Side::Primary, collection, pending.as_slice()).await {
        Ok(()) => {
            outcome.written_count += batch_len;
            *committed_so_far += batch_len;
            if let Some(candidate) = pending_high_watermark.take() {
                bump(committed_high_watermark, &candidate);
            }
            events.publish(Event::RecoveryProgress {
                collection: collection.to_string(),
                written_so_far: *committed_so_far,
                of_total: total,
            });
        }
        Err(_) => {
            outcome.errors += batch_len;
            *pending_high_watermark = None;
        }
    }
    pending.clear();
}

fn emit_recovered(events: &EventBus, collection: &str, written_count: usize) {
    events.publish(Event::CollectionRecovered {
        collection: collection.to_string(),
        written_count,
        timestamp: Utc::now(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::MemoryGateway;
    use serde_json::json;

    #[tokio::test]
    async fn recovers_documents_written_to_standby_during_outage() {
        let gw = MemoryGateway::new();
        gw.seed_document(Side::Standby, "appointments", "a1", json!({"updatedAt": "2024-01-01T00:00:01Z"}));
        gw.seed_document(Side::Standby, "appointments", "a2", json!({"updatedAt": "2024-01-01T00:00:02Z"}));

        let mut watermarks = WatermarkStore::new();
        let events = EventBus::new(64);

        let outcome = recover_collection(&gw, &mut watermarks, &events, "appointments").await.unwrap();

        assert_eq!(outcome.written_count, 2);
        assert!(gw.get_document(Side::Primary, "appointments", "a1").is_some());
        assert!(gw.get_document(Side::Primary, "appointments", "a2").is_some());
    }

    #[tokio::test]
    async fn recovery_never_overwrites_a_newer_primary_doc() {
        let gw = MemoryGateway::new();
        gw.seed_document(Side::Primary, "c", "a1", json!({"name": "primary-latest", "updatedAt": "2024-02-01T00:00:00Z"}));
        gw.seed_document(Side::Standby, "c", "a1", json!({"name": "standby-stale", "updatedAt": "2024-01-01T00:00:00Z"}));

        let mut watermarks = WatermarkStore::new();
        let events = EventBus::new(64);

        let outcome = recover_collection(&gw, &mut watermarks, &events, "c").await.unwrap();

        assert_eq!(outcome.written_count, 0);
        assert_eq!(outcome.duplicates_skipped, 1);
        let doc = gw.get_document(Side::Primary, "c", "a1").unwrap();
        assert_eq!(doc.data["name"], json!("primary-latest"));
    }

    #[tokio::test]
    async fn recover_watermark_is_independent_of_forward_watermark() {
        let gw = MemoryGateway::new();
        gw.seed_document(Side::Standby, "c", "a1", json!({"updatedAt": "2024-01-01T00:00:00Z"}));

        let mut watermarks = WatermarkStore::new();
        watermarks.advance("c", Direction::Forward, "2024-06-01T00:00:00Z");
        let events = EventBus::new(64);

        recover_collection(&gw, &mut watermarks, &events, "c").await.unwrap();

        assert_eq!(watermarks.get("c", Direction::Recover), Some("2024-01-01T00:00:00Z"));
        assert_eq!(watermarks.get("c", Direction::Forward), Some("2024-06-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn empty_standby_collection_is_a_no_op() {
        let gw = MemoryGateway::new();
        let mut watermarks = WatermarkStore::new();
        let events = EventBus::new(64);

        let outcome = recover_collection(&gw, &mut watermarks, &events, "ghost").await.unwrap();

        assert_eq!(outcome, RecoveryOutcome::default());
        assert!(watermarks.get("ghost", Direction::Recover).is_none());
    }
}
