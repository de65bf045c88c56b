//! The `DbGateway` capability boundary (§4.1).
//!
//! Everything above this trait is backend-agnostic: the replicator, the auth
//! replicator, the reconciler and the health monitor all talk to `dyn
//! DbGateway` trait objects, never to a concrete backend. Two implementations
//! ship with the crate: [`super::http_client::HttpGateway`] for a live REST
//! backend, and [`super::memory::MemoryGateway`] for tests and for embedding
//! without live infrastructure.

use async_trait::async_trait;

use crate::error::EngineResult;

use super::types::{DocumentRecord, HashParams, ImportOutcome, MultiGetResult, ProbeKind, Side, UserPage, UserRecord};

/// Safe upper bound for a single `BatchWrite`, kept below the backend's real
/// 500-operation ceiling (§4.1).
pub const BATCH_WRITE_LIMIT: usize = 450;

/// Page size used by `ListUsers` (§4.1).
pub const USER_PAGE_SIZE: usize = 1000;

#[async_trait]
pub trait DbGateway: Send + Sync {
    /// Lists all top-level collections on `side`.
    async fn list_collections(&self, side: Side) -> EngineResult<Vec<String>>;

    /// Scans `collection` on `side`, optionally filtered server-side to
    /// `updatedAt > since`. Order is arbitrary.
    async fn scan_since(
        &self,
        side: Side,
        collection: &str,
        since: Option<&str>,
    ) -> EngineResult<Vec<DocumentRecord>>;

    /// Fetches the documents named by `ids`; absent IDs are simply omitted
    /// from the returned map.
    async fn multi_get(
        &self,
        side: Side,
        collection: &str,
        ids: &[String],
    ) -> EngineResult<MultiGetResult>;

    /// Merges `writes` into existing documents in `collection` on `side`.
    /// Callers must keep `writes.len() <= BATCH_WRITE_LIMIT`.
    async fn batch_write(
        &self,
        side: Side,
        collection: &str,
        writes: &[(String, serde_json::Value)],
    ) -> EngineResult<()>;

    /// Lists up to `USER_PAGE_SIZE` users on `side`'s auth directory.
    async fn list_users(&self, side: Side, page_token: Option<&str>) -> EngineResult<UserPage>;

    /// Bulk-upserts `users` into `side`'s auth directory, preserving
    /// password-hash parameters opaquely.
    async fn import_users(
        &self,
        side: Side,
        users: &[UserRecord],
        hash_params: &HashParams,
    ) -> EngineResult<ImportOutcome>;

    /// Sets custom claims for a single user.
    async fn set_custom_claims(
        &self,
        side: Side,
        uid: &str,
        claims: &serde_json::Map<String, serde_json::Value>,
    ) -> EngineResult<()>;

    /// Fetches a single user record.
    async fn get_user(&self, side: Side, uid: &str) -> EngineResult<Option<UserRecord>>;

    /// Succeeds iff a trivial operation on `side`/`kind` completes before the
    /// caller's deadline. Implementations should never propagate errors here
    /// — probe failures are represented as `Ok(false)`.
    async fn probe(&self, side: Side, kind: ProbeKind) -> bool;
}
