//! Health Monitor (§4.2): probes all four endpoints concurrently on a fixed
//! cadence and publishes the result as an atomically-readable snapshot.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::events::{Event, EventBus};
use crate::gateway::traits::DbGateway;
use crate::gateway::types::{ProbeKind, Side};
use crate::observability::{Logger, Severity};

use super::snapshot::HealthSnapshot;

/// Maintains and refreshes the current [`HealthSnapshot`].
pub struct HealthMonitor {
    gateway: Arc<dyn DbGateway>,
    current: RwLock<HealthSnapshot>,
    events: EventBus,
}

impl HealthMonitor {
    pub fn new(gateway: Arc<dyn DbGateway>, events: EventBus) -> Self {
        Self {
            gateway,
            current: RwLock::new(HealthSnapshot::all_healthy(Utc::now())),
            events,
        }
    }

    /// Returns the most recently published snapshot.
    pub async fn current(&self) -> HealthSnapshot {
        *self.current.read().await
    }

    /// Runs one probe round: all four probes concurrently, deadline enforced
    /// by the gateway implementation itself. Publishes the result as a
    /// `health` event and updates the shared snapshot slot.
    pub async fn refresh(&self) -> HealthSnapshot {
        let (primary_db, standby_db, primary_auth, standby_auth) = tokio::join!(
            self.gateway.probe(Side::Primary, ProbeKind::Db),
            self.gateway.probe(Side::Standby, ProbeKind::Db),
            self.gateway.probe(Side::Primary, ProbeKind::Auth),
            self.gateway.probe(Side::Standby, ProbeKind::Auth),
        );

        let snapshot = HealthSnapshot {
            primary_db,
            standby_db,
            primary_auth,
            standby_auth,
            timestamp: Utc::now(),
        };

        {
            let mut current = self.current.write().await;
            *current = snapshot;
        }

        Logger::info(
            "healthProbe",
            &[
                ("primaryDb", bool_str(primary_db)),
                ("standbyDb", bool_str(standby_db)),
                ("primaryAuth", bool_str(primary_auth)),
                ("standbyAuth", bool_str(standby_auth)),
            ],
        );
        self.events.publish(Event::Health(snapshot));

        snapshot
    }

    /// Runs `refresh` forever on `interval`, until the returned task is
    /// aborted or the monitor is dropped. Intended to be spawned once at
    /// process start (see the `serve` CLI command).
    pub async fn run_forever(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.refresh().await;
        }
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

    #[tokio::test]
    async fn refresh_reflects_down_sides() {
        let gw = Arc::new(MemoryGateway::new());
        gw.set_down(Side::Primary, ProbeKind::Db, true);

        let monitor = HealthMonitor::new(gw, EventBus::new(16));
        let snapshot = monitor.refresh().await;

        assert!(!snapshot.primary_db);
        assert!(snapshot.standby_db);
        assert!(snapshot.primary_auth);
        assert!(snapshot.standby_auth);
    }

    #[tokio::test]
    async fn refresh_publishes_health_event() {
        let gw = Arc::new(MemoryGateway::new());
        let events = EventBus::new(16);
        let mut sub = events.subscribe();
        let monitor = HealthMonitor::new(gw, events);

        monitor.refresh().await;

        let event = sub.recv().await.unwrap();
        assert!(matches!(event, Event::Health(_)));
    }

    #[tokio::test]
    async fn current_reflects_last_refresh() {
        let gw = Arc::new(MemoryGateway::new());
        let monitor = HealthMonitor::new(gw.clone(), EventBus::new(16));

        gw.set_down(Side::Standby, ProbeKind::Auth, true);
        monitor.refresh().await;

        let current = monitor.current().await;
        assert!(!current.standby_auth);
    }
}
