//! Gating policy table (§4.2), consumed by the Coordinator.

use super::snapshot::HealthSnapshot;

/// What the Coordinator should do given the current health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Cannot read the source at all; the whole run is paused.
    Paused,
    /// Source is readable but target is not writable; the run errors out.
    Error,
    /// DB replication may proceed; auth replication must be skipped (paused).
    DbOnly,
    /// DB replication proceeds; auth replication should error instead of skip,
    /// because primary-auth is reachable but standby-auth is not.
    DbOkAuthError,
    /// Both db and auth sides are fully healthy.
    FullReplication,
}

/// Applies the gating table in §4.2.
pub fn decide(snapshot: &HealthSnapshot) -> GateDecision {
    if !snapshot.primary_db {
        return GateDecision::Paused;
    }
    if !snapshot.standby_db {
        return GateDecision::Error;
    }
    match (snapshot.primary_auth, snapshot.standby_auth) {
        (true, true) => GateDecision::FullReplication,
        (false, true) => GateDecision::DbOnly,
        (true, false) => GateDecision::DbOkAuthError,
        (false, false) => GateDecision::DbOnly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(primary_db: bool, standby_db: bool, primary_auth: bool, standby_auth: bool) -> HealthSnapshot {
        HealthSnapshot {
            primary_db,
            standby_db,
            primary_auth,
            standby_auth,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn primary_db_down_always_pauses() {
        assert_eq!(decide(&snapshot(false, true, true, true)), GateDecision::Paused);
        assert_eq!(decide(&snapshot(false, false, false, false)), GateDecision::Paused);
    }

    #[test]
    fn standby_db_down_errors() {
        assert_eq!(decide(&snapshot(true, false, true, true)), GateDecision::Error);
    }

    #[test]
    fn auth_down_on_standby_only_gates_db_only() {
        assert_eq!(decide(&snapshot(true, true, false, true)), GateDecision::DbOnly);
    }

    #[test]
    fn auth_down_on_primary_errors_auth_phase() {
        assert_eq!(decide(&snapshot(true, true, true, false)), GateDecision::DbOkAuthError);
    }

    #[test]
    fn all_healthy_is_full_replication() {
        assert_eq!(decide(&snapshot(true, true, true, true)), GateDecision::FullReplication);
    }
}
