//! A `DbGateway` adapter that swaps `Side::Primary` and `Side::Standby` on
//! every call.
//!
//! Recovery (§4.5) and auth recovery (§4.7 — "auth incremental into
//! primary") both reuse the forward-direction algorithms verbatim, just
//! pointed the other way. Rather than duplicating `replicate_collection` and
//! `replicate_auth` with the sides hardcoded in reverse, this wrapper lets
//! the same forward-direction code run unmodified against a gateway that
//! quietly reads from standby and writes to primary.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::EngineResult;

use super::traits::DbGateway;
use super::types::{DocumentRecord, HashParams, ImportOutcome, MultiGetResult, ProbeKind, Side, UserPage, UserRecord};

/// Wraps a `DbGateway` so that `Side::Primary` means standby and vice versa.
pub struct SwappedGateway<'a> {
    inner: &'a dyn DbGateway,
}

impl<'a> SwappedGateway<'a> {
    pub fn new(inner: &'a dyn DbGateway) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<'a> DbGateway for SwappedGateway<'a> {
    async fn list_collections(&self, side: Side) -> EngineResult<Vec<String>> {
        self.inner.list_collections(side.other()).await
    }

    async fn scan_since(&self, side: Side, collection: &str, since: Option<&str>) -> EngineResult<Vec<DocumentRecord>> {
        self.inner.scan_since(side.other(), collection, since).await
    }

    async fn multi_get(&self, side: Side, collection: &str, ids: &[String]) -> EngineResult<MultiGetResult> {
        self.inner.multi_get(side.other(), collection, ids).await
    }

    async fn batch_write(&self, side: Side, collection: &str, writes: &[(String, Value)]) -> EngineResult<()> {
        self.inner.batch_write(side.other(), collection, writes).await
    }

    async fn list_users(&self, side: Side, page_token: Option<&str>) -> EngineResult<UserPage> {
        self.inner.list_users(side.other(), page_token).await
    }

    async fn import_users(&self, side: Side, users: &[UserRecord], hash_params: &HashParams) -> EngineResult<ImportOutcome> {
        self.inner.import_users(side.other(), users, hash_params).await
    }

    async fn set_custom_claims(&self, side: Side, uid: &str, claims: &Map<String, Value>) -> EngineResult<()> {
        self.inner.set_custom_claims(side.other(), uid, claims).await
    }

    async fn get_user(&self, side: Side, uid: &str) -> EngineResult<Option<UserRecord>> {
        self.inner.get_user(side.other(), uid).await
    }

    async fn probe(&self, side: Side, kind: ProbeKind) -> bool {
        self.inner.probe(side.other(), kind).await
    }
}
