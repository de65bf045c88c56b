pub mod gating;
pub mod monitor;
pub mod snapshot;

pub use gating::{decide, GateDecision};
pub use monitor::HealthMonitor;
pub use snapshot::HealthSnapshot;
