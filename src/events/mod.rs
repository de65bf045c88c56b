pub mod event;
pub mod bus;

pub use event::{AuthPhase, Event, RunMode};
pub use bus::{EventBus, EventSubscription};
