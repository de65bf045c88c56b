//! Typed events published by the engine (§6).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::coordinator::stats::RunCounters;
use crate::health::snapshot::HealthSnapshot;
use crate::reconciler::IntegrityReport;

/// Which pass produced an event — forward replication or recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Forward,
    Recovery,
}

/// Phase tag for auth progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthPhase {
    Export,
    Import,
}

/// Every typed event the engine can publish. Serializes as a tagged JSON
/// object: `{"type": "...", ...fields}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "health")]
    Health(HealthSnapshot),

    #[serde(rename = "stats")]
    Stats(RunCounters),

    #[serde(rename = "collectionProgress")]
    CollectionProgress {
        collection: String,
        #[serde(rename = "writtenSoFar")]
        written_so_far: usize,
        #[serde(rename = "ofTotal")]
        of_total: usize,
        phase: &'static str,
    },

    #[serde(rename = "collectionCompleted")]
    CollectionCompleted {
        collection: String,
        #[serde(rename = "writtenCount")]
        written_count: usize,
        incremental: bool,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "collectionRecovered")]
    CollectionRecovered {
        collection: String,
        #[serde(rename = "writtenCount")]
        written_count: usize,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "recoveryProgress")]
    RecoveryProgress {
        collection: String,
        #[serde(rename = "writtenSoFar")]
        written_so_far: usize,
        #[serde(rename = "ofTotal")]
        of_total: usize,
    },

    #[serde(rename = "schemaChange")]
    SchemaChange {
        collection: String,
        #[serde(rename = "newKeys")]
        new_keys: Vec<String>,
        #[serde(rename = "totalKeys")]
        total_keys: usize,
    },

    #[serde(rename = "autoRunTriggered")]
    AutoRunTriggered {
        timestamp: DateTime<Utc>,
        #[serde(rename = "intervalHint")]
        interval_hint_secs: u64,
    },

    #[serde(rename = "authProgress")]
    AuthProgress {
        phase: AuthPhase,
        #[serde(rename = "userCount")]
        user_count: usize,
        #[serde(rename = "ofTotal")]
        of_total: usize,
    },

    #[serde(rename = "authCompleted")]
    AuthCompleted {
        #[serde(rename = "totalUsers")]
        total_users: usize,
        #[serde(rename = "syncedUsers")]
        synced_users: usize,
        #[serde(rename = "customClaimsPropagated")]
        custom_claims_propagated: usize,
        errors: usize,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "integrityReport")]
    IntegrityReport(IntegrityReport),

    #[serde(rename = "authIntegrityReport")]
    AuthIntegrityReport {
        #[serde(rename = "primaryCount")]
        primary_count: usize,
        #[serde(rename = "standbyCount")]
        standby_count: usize,
        #[serde(rename = "missingInStandby")]
        missing_in_standby: Vec<String>,
        #[serde(rename = "missingInPrimary")]
        missing_in_primary: Vec<String>,
    },

    #[serde(rename = "statsReset")]
    StatsReset { timestamp: DateTime<Utc> },

    #[serde(rename = "runStarted")]
    RunStarted { timestamp: DateTime<Utc>, mode: RunMode },

    #[serde(rename = "runCompleted")]
    RunCompleted {
        timestamp: DateTime<Utc>,
        mode: RunMode,
        status: &'static str,
    },
}
