pub mod http_client;
pub mod memory;
pub mod retry;
pub mod retrying;
pub mod swapped;
pub mod traits;
pub mod types;

pub use http_client::HttpGateway;
pub use memory::MemoryGateway;
pub use retrying::RetryingGateway;
pub use swapped::SwappedGateway;
pub use traits::DbGateway;
pub use types::{DocumentRecord, HashParams, ProbeKind, Side, UserRecord};
