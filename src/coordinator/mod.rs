//! Coordinator (§4.7): the top-level state machine. Serializes replication
//! and recovery passes, consults the Health Monitor, drives the other
//! components, persists the watermark/counter file, and publishes events.
//!
//! Collapses the source's "enhanced service wraps base service" inheritance
//! into one type that composes `DocumentReplicator`, `AuthReplicator`,
//! `HealthMonitor` and `Reconciler` behind a single run-lock (§9) — no
//! runtime polymorphism needed.

pub mod stats;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::auth_replicator::{replicate_auth, AuthReplicationMode};
use crate::document_replicator::{
    recover_collection, replicate_collection, Direction, ReplicationMode, WatermarkStore, READ_CHUNK_SIZE,
};
use crate::error::EngineResult;
use crate::events::{Event, EventBus, RunMode};
use crate::gateway::traits::DbGateway;
use crate::gateway::types::{HashParams, Side};
use crate::gateway::SwappedGateway;
use crate::health::{decide, GateDecision, HealthMonitor, HealthSnapshot};
use crate::observability::Logger;
use crate::reconciler::{reconcile_all, reconcile_auth, IntegrityReport};
use crate::schema_tracker::SchemaTracker;

pub use stats::{AuthCounters, PersistedState, RunCounters, StatsStore};

/// How many forward runs elapse between implicit reconcile passes (§4.8).
pub const RECONCILE_EVERY_N_RUNS: u64 = 10;

/// Top-level engine state (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinatorStatus {
    Idle,
    Running,
    Recovering,
    Paused,
    Error,
}

/// Outcome of one control-surface action: the `{success, message, stats?}`
/// envelope described in §7, modeled here and serialized as-is by the HTTP
/// adapter.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub success: bool,
    pub message: String,
    pub status: CoordinatorStatus,
}

impl RunOutcome {
    fn ok(status: CoordinatorStatus, message: impl Into<String>) -> Self {
        Self { success: true, message: message.into(), status }
    }

    fn busy() -> Self {
        Self {
            success: false,
            message: "a run is already in progress".to_string(),
            status: CoordinatorStatus::Running,
        }
    }

    /// Outcome reported by the control surface after `ResetStats()` succeeds.
    pub fn reset_ok() -> Self {
        Self::ok(CoordinatorStatus::Idle, "counters reset")
    }
}

/// Full snapshot returned by `Stats()` (§4.7): counters, watermarks,
/// schemas, and the current health picture.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    #[serde(flatten)]
    pub counters: RunCounters,
    pub watermarks: WatermarkStore,
    pub schemas: HashMap<String, Vec<String>>,
    pub health: HealthSnapshot,
    pub status: CoordinatorStatus,
}

/// The mutable state a serialized run is allowed to touch: counters and
/// watermarks. Owned exclusively by the Coordinator (§9).
struct EngineState {
    counters: RunCounters,
    watermarks: WatermarkStore,
}

pub struct Coordinator {
    gateway: Arc<dyn DbGateway>,
    events: EventBus,
    health: Arc<HealthMonitor>,
    schema: Arc<SchemaTracker>,
    stats_store: StatsStore,
    hash_params: HashParams,
    read_chunk_size: usize,
    run_lock: Mutex<()>,
    state: Mutex<EngineState>,
    status: tokio::sync::RwLock<CoordinatorStatus>,
}

impl Coordinator {
    pub fn new(
        gateway: Arc<dyn DbGateway>,
        events: EventBus,
        health: Arc<HealthMonitor>,
        stats_path: impl Into<std::path::PathBuf>,
        hash_params: HashParams,
        read_chunk_size: usize,
    ) -> Self {
        let stats_store = StatsStore::new(stats_path);
        let persisted = stats_store.load();

        Self {
            gateway,
            events,
            health,
            schema: Arc::new(SchemaTracker::new()),
            stats_store,
            hash_params,
            read_chunk_size,
            run_lock: Mutex::new(()),
            state: Mutex::new(EngineState {
                counters: persisted.counters,
                watermarks: persisted.watermarks,
            }),
            status: tokio::sync::RwLock::new(CoordinatorStatus::Idle),
        }
    }

    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    pub fn health_monitor(&self) -> Arc<HealthMonitor> {
        self.health.clone()
    }

    pub async fn status(&self) -> CoordinatorStatus {
        *self.status.read().await
    }

    /// `ListCollections` passthrough for the control surface (§6).
    pub async fn list_collections(&self) -> EngineResult<Vec<String>> {
        self.gateway.list_collections(Side::Primary).await
    }

    /// Schema lookup passthrough for the control surface (§6).
    pub async fn schema_for(&self, collection: &str) -> Vec<String> {
        self.schema.schema_for(collection)
    }

    /// `Stats()` (§4.7): a consistent snapshot of counters, watermarks,
    /// schemas, and the current health picture.
    pub async fn stats(&self) -> StatsSnapshot {
        let state = self.state.lock().await;
        let collections = state.watermarks.collection_names();
        let schemas = collections.iter().map(|c| (c.clone(), self.schema.schema_for(c))).collect();

        StatsSnapshot {
            counters: state.counters.clone(),
            watermarks: state.watermarks.clone(),
            schemas,
            health: self.health.current().await,
            status: *self.status.read().await,
        }
    }

    /// `ResetStats()` (§4.7): zeroes the counters (watermarks are untouched
    /// — they reflect real replication progress, not a display counter) and
    /// emits `statsReset`.
    pub async fn reset_stats(&self) -> EngineResult<()> {
        let mut state = self.state.lock().await;
        state.counters = RunCounters::default();
        self.persist(&state)?;
        drop(state);
        self.events.publish(Event::StatsReset { timestamp: Utc::now() });
        Ok(())
    }

    /// `RunOnce()` (§4.7): health gate -> collection discovery -> schema
    /// refresh -> per-collection forward replication -> auth replication ->
    /// persist counters -> emit stats.
    pub async fn run_once(&self) -> RunOutcome {
        let Ok(_guard) = self.run_lock.try_lock() else {
            return RunOutcome::busy();
        };

        *self.status.write().await = CoordinatorStatus::Running;
        self.events.publish(Event::RunStarted { timestamp: Utc::now(), mode: RunMode::Forward });

        let snapshot = self.health.current().await;
        let outcome = match decide(&snapshot) {
            GateDecision::Paused => self.finish_paused().await,
            GateDecision::Error => self.finish_errored().await,
            gate => self.run_forward_pass(gate).await,
        };

        self.events.publish(Event::RunCompleted {
            timestamp: Utc::now(),
            mode: RunMode::Forward,
            status: status_label(outcome.status),
        });
        *self.status.write().await = CoordinatorStatus::Idle;

        outcome
    }

    /// `ForceFull()` (§4.7): clears all forward watermarks, then `RunOnce()`.
    pub async fn force_full(&self) -> RunOutcome {
        {
            let mut state = self.state.lock().await;
            state.watermarks.reset_forward_all();
        }
        let outcome = self.run_once().await;
        if outcome.success {
            let mut state = self.state.lock().await;
            state.counters.last_full_run_at = Some(Utc::now());
            let _ = self.persist(&state);
        }
        outcome
    }

    /// `ForceAuth()` (§4.7): an auth-only full pass.
    pub async fn force_auth(&self) -> RunOutcome {
        let Ok(_guard) = self.run_lock.try_lock() else {
            return RunOutcome::busy();
        };

        *self.status.write().await = CoordinatorStatus::Running;
        let snapshot = self.health.current().await;
        let outcome = match decide(&snapshot) {
            GateDecision::Paused => self.finish_paused().await,
            GateDecision::Error | GateDecision::DbOkAuthError => self.finish_auth_errored().await,
            GateDecision::DbOnly => {
                let state = self.state.lock().await;
                let _ = self.persist(&state);
                RunOutcome::ok(CoordinatorStatus::Paused, "primary auth unavailable; auth run paused")
            }
            GateDecision::FullReplication => {
                let mut state = self.state.lock().await;
                self.run_auth_phase(&mut state, AuthReplicationMode::Full).await;
                let _ = self.persist(&state);
                RunOutcome::ok(CoordinatorStatus::Idle, "auth replication completed")
            }
        };
        *self.status.write().await = CoordinatorStatus::Idle;
        outcome
    }

    /// `Recover()` (§4.7 / §4.5): health gate -> per-collection recovery ->
    /// auth incremental into primary -> reconcile. Only proceeds when both
    /// sides are fully healthy; recovery is never automatic.
    pub async fn recover(&self) -> RunOutcome {
        let Ok(_guard) = self.run_lock.try_lock() else {
            return RunOutcome::busy();
        };

        *self.status.write().await = CoordinatorStatus::Recovering;
        self.events.publish(Event::RunStarted { timestamp: Utc::now(), mode: RunMode::Recovery });

        let snapshot = self.health.current().await;
        let outcome = if !matches!(decide(&snapshot), GateDecision::FullReplication) {
            self.finish_paused().await
        } else {
            let mut state = self.state.lock().await;
            let collections = match self.gateway.list_collections(Side::Standby).await {
                Ok(names) => names,
                Err(_) => {
                    state.counters.errors += 1;
                    Vec::new()
                }
            };

            for collection in &collections {
                match recover_collection(self.gateway.as_ref(), &mut state.watermarks, &self.events, collection).await {
                    Ok(result) => {
                        state.counters.total_documents_written += result.written_count as u64;
                        state.counters.duplicates_skipped += result.duplicates_skipped as u64;
                        state.counters.errors += result.errors as u64;
                    }
                    Err(_) => state.counters.errors += 1,
                }
            }

            let swapped = SwappedGateway::new(self.gateway.as_ref());
            let since = state.counters.auth.last_auth_run_at.map(|t| t.to_rfc3339());
            match replicate_auth(&swapped, &self.events, AuthReplicationMode::Incremental, since.as_deref(), &self.hash_params).await {
                Ok(result) => {
                    state.counters.auth.total_users += result.total_users;
                    state.counters.auth.synced_users += result.synced_users;
                    state.counters.auth.custom_claims_propagated += result.custom_claims_propagated;
                    state.counters.auth.auth_errors += result.errors;
                }
                Err(_) => state.counters.auth.auth_errors += 1,
            }
            state.counters.auth.last_auth_run_at = Some(Utc::now());

            let _ = self.persist(&state);
            drop(state);

            let _ = self.reconcile().await;

            RunOutcome::ok(CoordinatorStatus::Idle, "recovery completed")
        };

        self.events.publish(Event::RunCompleted {
            timestamp: Utc::now(),
            mode: RunMode::Recovery,
            status: status_label(outcome.status),
        });
        *self.status.write().await = CoordinatorStatus::Idle;

        outcome
    }

    /// `Reconcile()` (§4.8): compares ID sets on both sides and publishes a
    /// report per collection plus an auth report. Never modifies either
    /// side; does not require the run lock since it only reads.
    pub async fn reconcile(&self) -> EngineResult<Vec<IntegrityReport>> {
        let collections = self.gateway.list_collections(Side::Primary).await?;
        let mut reports = reconcile_all(self.gateway.as_ref(), &self.events, &collections).await?;

        let auth_report = reconcile_auth(self.gateway.as_ref()).await?;
        self.events.publish(Event::AuthIntegrityReport {
            primary_count: auth_report.primary_count,
            standby_count: auth_report.standby_count,
            missing_in_standby: auth_report.missing_in_standby.clone(),
            missing_in_primary: auth_report.missing_in_primary.clone(),
        });
        reports.push(auth_report);

        Ok(reports)
    }

    async fn run_forward_pass(&self, gate: GateDecision) -> RunOutcome {
        let mut state = self.state.lock().await;

        let collections = match self.gateway.list_collections(Side::Primary).await {
            Ok(names) => names,
            Err(_) => {
                state.counters.errors += 1;
                let _ = self.persist(&state);
                return RunOutcome::ok(CoordinatorStatus::Error, "could not list collections");
            }
        };

        let mut paused = false;
        for collection in &collections {
            let current = self.health.current().await;
            if !current.primary_db {
                paused = true;
                break;
            }

            if let Ok(sample) = self.gateway.scan_since(Side::Primary, collection, None).await {
                self.schema.observe(collection, &sample[..sample.len().min(crate::schema_tracker::SAMPLE_SIZE)], &self.events);
            }

            match replicate_collection(
                self.gateway.as_ref(),
                &mut state.watermarks,
                &self.events,
                collection,
                ReplicationMode::Incremental,
                self.read_chunk_size,
            )
            .await
            {
                Ok(result) => {
                    state.counters.total_documents_written += result.written_count as u64;
                    state.counters.duplicates_skipped += result.duplicates_skipped as u64;
                    state.counters.errors += result.errors as u64;
                }
                Err(err) => {
                    state.counters.errors += 1;
                    Logger::error("collectionReplicationFailed", &[("collection", collection.as_str()), ("reason", err.to_string().as_str())]);
                }
            }
        }

        state.counters.incremental_run_count += 1;
        state.counters.last_run_at = Some(Utc::now());

        if paused {
            let _ = self.persist(&state);
            return RunOutcome::ok(CoordinatorStatus::Paused, "primary became unavailable mid-run; remaining collections skipped");
        }

        match gate {
            GateDecision::FullReplication => self.run_auth_phase(&mut state, Self::auth_mode_for(&state.counters)).await,
            GateDecision::DbOkAuthError => state.counters.auth.auth_errors += 1,
            GateDecision::DbOnly => {}
            _ => unreachable!("paused/error handled by caller"),
        }

        let should_reconcile = state.counters.incremental_run_count % RECONCILE_EVERY_N_RUNS == 0;
        let _ = self.persist(&state);
        drop(state);

        if should_reconcile {
            let _ = self.reconcile().await;
        }

        RunOutcome::ok(CoordinatorStatus::Idle, "run completed")
    }

    async fn run_auth_phase(&self, state: &mut EngineState, mode: AuthReplicationMode) {
        let since = state.counters.auth.last_auth_run_at.map(|t| t.to_rfc3339());
        match replicate_auth(self.gateway.as_ref(), &self.events, mode, since.as_deref(), &self.hash_params).await {
            Ok(result) => {
                state.counters.auth.total_users += result.total_users;
                state.counters.auth.synced_users += result.synced_users;
                state.counters.auth.custom_claims_propagated += result.custom_claims_propagated;
                state.counters.auth.auth_errors += result.errors;
            }
            Err(err) => {
                state.counters.auth.auth_errors += 1;
                Logger::error("authReplicationFailed", &[("reason", err.to_string().as_str())]);
            }
        }
        state.counters.auth.last_auth_run_at = Some(Utc::now());
    }

    fn auth_mode_for(counters: &RunCounters) -> AuthReplicationMode {
        match counters.auth.last_auth_run_at {
            Some(_) => AuthReplicationMode::Incremental,
            None => AuthReplicationMode::Full,
        }
    }

    async fn finish_paused(&self) -> RunOutcome {
        let state = self.state.lock().await;
        let _ = self.persist(&state);
        let snapshot = self.health.current().await;
        Logger::info(
            "runPaused",
            &[("primaryDb", bool_str(snapshot.primary_db)), ("standbyDb", bool_str(snapshot.standby_db))],
        );
        RunOutcome::ok(CoordinatorStatus::Paused, "primary unavailable; run paused")
    }

    async fn finish_errored(&self) -> RunOutcome {
        let mut state = self.state.lock().await;
        state.counters.errors += 1;
        let _ = self.persist(&state);
        RunOutcome::ok(CoordinatorStatus::Error, "standby unavailable; run aborted")
    }

    async fn finish_auth_errored(&self) -> RunOutcome {
        let mut state = self.state.lock().await;
        state.counters.auth.auth_errors += 1;
        let _ = self.persist(&state);
        RunOutcome::ok(CoordinatorStatus::Error, "standby auth unavailable; auth run aborted")
    }

    fn persist(&self, state: &EngineState) -> EngineResult<()> {
        let persisted = PersistedState {
            counters: state.counters.clone(),
            watermarks: state.watermarks.clone(),
            auth_watermark: state.counters.auth.last_auth_run_at.map(|t| t.to_rfc3339()),
        };
        self.stats_store.save(&persisted)
    }
}

fn status_label(status: CoordinatorStatus) -> &'static str {
    match status {
        CoordinatorStatus::Idle => "completed",
        CoordinatorStatus::Running => "running",
        CoordinatorStatus::Recovering => "recovering",
        CoordinatorStatus::Paused => "paused",
        CoordinatorStatus::Error => "error",
    }
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::MemoryGateway;
    use crate::gateway::types::ProbeKind;
    use serde_json::json;
    use tempfile::tempdir;

    fn stats_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
        dir.path().join("stats.json")
    }

    async fn coordinator_with(gw: Arc<MemoryGateway>, dir: &tempfile::TempDir) -> Coordinator {
        let events = EventBus::new(256);
        let health = Arc::new(HealthMonitor::new(gw.clone(), events.clone()));
        health.refresh().await;
        Coordinator::new(gw, events, health, stats_path(dir), HashParams::default(), READ_CHUNK_SIZE)
    }

    #[tokio::test]
    async fn fresh_bring_up_replicates_all_collections_and_users() {
        let gw = Arc::new(MemoryGateway::new());
        gw.seed_document(Side::Primary, "appointments", "a1", json!({"updatedAt": "2024-01-01T00:00:01Z"}));
        gw.seed_document(Side::Primary, "appointments", "a2", json!({"updatedAt": "2024-01-01T00:00:02Z"}));
        gw.seed_document(Side::Primary, "appointments", "a3", json!({"updatedAt": "2024-01-01T00:00:03Z"}));
        gw.seed_user(Side::Primary, crate::gateway::types::UserRecord { uid: "u1".into(), ..Default::default() });
        gw.seed_user(Side::Primary, crate::gateway::types::UserRecord { uid: "u2".into(), ..Default::default() });

        let dir = tempdir().unwrap();
        let coordinator = coordinator_with(gw.clone(), &dir).await;

        let outcome = coordinator.run_once().await;
        assert!(outcome.success);
        assert_eq!(outcome.status, CoordinatorStatus::Idle);

        let stats = coordinator.stats().await;
        assert_eq!(stats.counters.total_documents_written, 3);
        assert_eq!(stats.counters.duplicates_skipped, 0);
        assert_eq!(stats.counters.auth.synced_users, 2);
        assert_eq!(stats.watermarks.get("appointments", Direction::Forward), Some("2024-01-01T00:00:03Z"));
    }

    #[tokio::test]
    async fn incremental_rerun_with_no_changes_writes_nothing() {
        let gw = Arc::new(MemoryGateway::new());
        gw.seed_document(Side::Primary, "appointments", "a1", json!({"updatedAt": "2024-01-01T00:00:01Z"}));

        let dir = tempdir().unwrap();
        let coordinator = coordinator_with(gw.clone(), &dir).await;

        coordinator.run_once().await;
        let before = coordinator.stats().await.counters.total_documents_written;

        coordinator.run_once().await;
        let after = coordinator.stats().await.counters.total_documents_written;

        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn primary_down_pauses_the_run() {
        let gw = Arc::new(MemoryGateway::new());
        gw.set_down(Side::Primary, ProbeKind::Db, true);

        let dir = tempdir().unwrap();
        let coordinator = coordinator_with(gw.clone(), &dir).await;

        let outcome = coordinator.run_once().await;
        assert_eq!(outcome.status, CoordinatorStatus::Paused);
        assert_eq!(coordinator.stats().await.counters.errors, 0);
    }

    #[tokio::test]
    async fn standby_down_errors_the_run() {
        let gw = Arc::new(MemoryGateway::new());
        gw.set_down(Side::Standby, ProbeKind::Db, true);

        let dir = tempdir().unwrap();
        let coordinator = coordinator_with(gw.clone(), &dir).await;

        let outcome = coordinator.run_once().await;
        assert_eq!(outcome.status, CoordinatorStatus::Error);
        assert_eq!(coordinator.stats().await.counters.errors, 1);
    }

    #[tokio::test]
    async fn force_full_resets_watermark_before_rerunning() {
        let gw = Arc::new(MemoryGateway::new());
        gw.seed_document(Side::Primary, "c", "a1", json!({"updatedAt": "2024-01-01T00:00:01Z"}));

        let dir = tempdir().unwrap();
        let coordinator = coordinator_with(gw.clone(), &dir).await;

        coordinator.run_once().await;
        let outcome = coordinator.force_full().await;

        assert!(outcome.success);
        let stats = coordinator.stats().await;
        assert!(stats.counters.last_full_run_at.is_some());
    }

    #[tokio::test]
    async fn recover_round_trips_a_standby_only_document() {
        let gw = Arc::new(MemoryGateway::new());
        gw.seed_document(Side::Standby, "appointments", "a4", json!({"updatedAt": "2024-01-01T00:00:04Z"}));

        let dir = tempdir().unwrap();
        let coordinator = coordinator_with(gw.clone(), &dir).await;

        let outcome = coordinator.recover().await;
        assert!(outcome.success);
        assert!(gw.get_document(Side::Primary, "appointments", "a4").is_some());
    }

    #[tokio::test]
    async fn reconcile_reports_divergence_without_mutating() {
        let gw = Arc::new(MemoryGateway::new());
        gw.seed_document(Side::Primary, "appointments", "a1", json!({}));
        gw.seed_document(Side::Primary, "appointments", "a8", json!({}));
        gw.seed_document(Side::Standby, "appointments", "a1", json!({}));
        gw.seed_document(Side::Standby, "appointments", "a9", json!({}));

        let dir = tempdir().unwrap();
        let coordinator = coordinator_with(gw.clone(), &dir).await;

        let reports = coordinator.reconcile().await.unwrap();
        let appointments = reports.iter().find(|r| r.collection == "appointments").unwrap();

        assert_eq!(appointments.missing_in_standby, vec!["a8".to_string()]);
        assert_eq!(appointments.missing_in_primary, vec!["a9".to_string()]);
        assert_eq!(gw.document_count(Side::Standby, "appointments"), 2);
    }

    #[tokio::test]
    async fn reset_stats_zeroes_counters_but_keeps_watermarks() {
        let gw = Arc::new(MemoryGateway::new());
        gw.seed_document(Side::Primary, "c", "a1", json!({"updatedAt": "2024-01-01T00:00:01Z"}));

        let dir = tempdir().unwrap();
        let coordinator = coordinator_with(gw.clone(), &dir).await;
        coordinator.run_once().await;

        coordinator.reset_stats().await.unwrap();
        let stats = coordinator.stats().await;

        assert_eq!(stats.counters.total_documents_written, 0);
        assert_eq!(stats.watermarks.get("c", Direction::Forward), Some("2024-01-01T00:00:01Z"));
    }

    #[tokio::test]
    async fn concurrent_run_once_calls_only_one_proceeds() {
        let gw = Arc::new(MemoryGateway::new());
        gw.seed_document(Side::Primary, "c", "a1", json!({"updatedAt": "2024-01-01T00:00:01Z"}));

        let dir = tempdir().unwrap();
        let coordinator = Arc::new(coordinator_with(gw.clone(), &dir).await);

        let first = coordinator.clone();
        let second = coordinator.clone();
        let (a, b) = tokio::join!(
            tokio::spawn(async move { first.run_once().await }),
            tokio::spawn(async move { second.run_once().await }),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        let busy_count = [&a, &b].iter().filter(|o| !o.success).count();
        assert!(busy_count <= 1);
    }

    #[tokio::test]
    async fn restart_resumes_from_persisted_watermark() {
        let gw = Arc::new(MemoryGateway::new());
        gw.seed_document(Side::Primary, "c", "a1", json!({"updatedAt": "2024-01-01T00:00:01Z"}));

        let dir = tempdir().unwrap();
        {
            let coordinator = coordinator_with(gw.clone(), &dir).await;
            coordinator.run_once().await;
        }

        let coordinator = coordinator_with(gw.clone(), &dir).await;
        let stats = coordinator.stats().await;
        assert_eq!(stats.watermarks.get("c", Direction::Forward), Some("2024-01-01T00:00:01Z"));
        assert_eq!(stats.counters.total_documents_written, 1);
    }
}
