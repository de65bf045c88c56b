//! Document replication: forward (primary -> standby) and recovery
//! (standby -> primary) passes over a single collection, plus the
//! watermarks that drive both (§4.4, §4.5, §3).

pub mod recovery;
pub mod replicator;
pub mod watermark;

pub use recovery::{recover_collection, RecoveryOutcome};
pub use replicator::{replicate_collection, ReplicationMode, ReplicationOutcome, READ_CHUNK_SIZE};
pub use watermark::{CollectionWatermark, Direction, WatermarkStore};
