//! A `DbGateway` wrapper that retries transient failures with exponential
//! backoff (§7) before they ever reach the Coordinator.
//!
//! Probes are deliberately excluded: a probe's whole point is to observe
//! *current* reachability within its deadline, so retrying one would just
//! reimplement the deadline as a longer deadline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::EngineResult;

use super::retry::with_retry;
use super::traits::DbGateway;
use super::types::{DocumentRecord, HashParams, ImportOutcome, MultiGetResult, ProbeKind, Side, UserPage, UserRecord};

const BASE_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Wraps any `DbGateway`, retrying transient errors up to `max_attempts`
/// times with exponential backoff (`MAX_RETRY_ATTEMPTS`, §6).
pub struct RetryingGateway {
    inner: Arc<dyn DbGateway>,
    max_attempts: u32,
}

impl RetryingGateway {
    pub fn new(inner: Arc<dyn DbGateway>, max_attempts: u32) -> Self {
        Self { inner, max_attempts: max_attempts.max(1) }
    }
}

#[async_trait]
impl DbGateway for RetryingGateway {
    async fn list_collections(&self, side: Side) -> EngineResult<Vec<String>> {
        with_retry(self.max_attempts, BASE_BACKOFF, MAX_BACKOFF, || self.inner.list_collections(side)).await
    }

    async fn scan_since(&self, side: Side, collection: &str, since: Option<&str>) -> EngineResult<Vec<DocumentRecord>> {
        with_retry(self.max_attempts, BASE_BACKOFF, MAX_BACKOFF, || self.inner.scan_since(side, collection, since)).await
    }

    async fn multi_get(&self, side: Side, collection: &str, ids: &[String]) -> EngineResult<MultiGetResult> {
        with_retry(self.max_attempts, BASE_BACKOFF, MAX_BACKOFF, || self.inner.multi_get(side, collection, ids)).await
    }

    async fn batch_write(&self, side: Side, collection: &str, writes: &[(String, Value)]) -> EngineResult<()> {
        with_retry(self.max_attempts, BASE_BACKOFF, MAX_BACKOFF, || self.inner.batch_write(side, collection, writes)).await
    }

    async fn list_users(&self, side: Side, page_token: Option<&str>) -> EngineResult<UserPage> {
        with_retry(self.max_attempts, BASE_BACKOFF, MAX_BACKOFF, || self.inner.list_users(side, page_token)).await
    }

    async fn import_users(&self, side: Side, users: &[UserRecord], hash_params: &HashParams) -> EngineResult<ImportOutcome> {
        with_retry(self.max_attempts, BASE_BACKOFF, MAX_BACKOFF, || self.inner.import_users(side, users, hash_params)).await
    }

    async fn set_custom_claims(&self, side: Side, uid: &str, claims: &Map<String, Value>) -> EngineResult<()> {
        with_retry(self.max_attempts, BASE_BACKOFF, MAX_BACKOFF, || self.inner.set_custom_claims(side, uid, claims)).await
    }

    async fn get_user(&self, side: Side, uid: &str) -> EngineResult<Option<UserRecord>> {
        with_retry(self.max_attempts, BASE_BACKOFF, MAX_BACKOFF, || self.inner.get_user(side, uid)).await
    }

    async fn probe(&self, side: Side, kind: ProbeKind) -> bool {
        self.inner.probe(side, kind).await
    }
}
