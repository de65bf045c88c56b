//! `HealthSnapshot` — the four-boolean health picture (§3).

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub primary_db: bool,
    pub standby_db: bool,
    pub primary_auth: bool,
    pub standby_auth: bool,
    pub timestamp: DateTime<Utc>,
}

impl HealthSnapshot {
    /// An all-healthy snapshot, used before the first probe round completes
    /// and in tests.
    pub fn all_healthy(now: DateTime<Utc>) -> Self {
        Self {
            primary_db: true,
            standby_db: true,
            primary_auth: true,
            standby_auth: true,
            timestamp: now,
        }
    }
}
