//! In-memory `DbGateway` used by the engine's own tests and by embedders
//! without live backend infrastructure.
//!
//! Four independent stores back this gateway: primary documents, standby
//! documents, primary users, standby users. Health can be forced down per
//! side/kind to exercise the gating policy deterministically in tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{EngineError, EngineResult};

use super::traits::{DbGateway, BATCH_WRITE_LIMIT, USER_PAGE_SIZE};
use super::types::{
    DocumentRecord, HashParams, ImportError, ImportOutcome, MultiGetResult, ProbeKind, Side, UserPage, UserRecord,
};

#[derive(Default)]
struct SideStore {
    /// collection -> doc id -> document
    collections: HashMap<String, HashMap<String, DocumentRecord>>,
    /// uid -> user
    users: HashMap<String, UserRecord>,
}

#[derive(Default)]
struct DownFlags {
    db: bool,
    auth: bool,
}

/// An in-process, in-memory stand-in for both databases and both auth
/// directories. Cheap to construct, deterministic, safe for tests.
pub struct MemoryGateway {
    primary: RwLock<SideStore>,
    standby: RwLock<SideStore>,
    primary_down: RwLock<DownFlags>,
    standby_down: RwLock<DownFlags>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            primary: RwLock::new(SideStore::default()),
            standby: RwLock::new(SideStore::default()),
            primary_down: RwLock::new(DownFlags::default()),
            standby_down: RwLock::new(DownFlags::default()),
        }
    }

    fn store(&self, side: Side) -> &RwLock<SideStore> {
        match side {
            Side::Primary => &self.primary,
            Side::Standby => &self.standby,
        }
    }

    fn down_flags(&self, side: Side) -> &RwLock<DownFlags> {
        match side {
            Side::Primary => &self.primary_down,
            Side::Standby => &self.standby_down,
        }
    }

    /// Test/embedding helper: seed a document directly, bypassing writes.
    pub fn seed_document(&self, side: Side, collection: &str, id: &str, data: Value) {
        let record = DocumentRecord::new(id, data);
        let mut store = self.store(side).write().unwrap();
        store
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), record);
    }

    /// Test/embedding helper: seed a user directly.
    pub fn seed_user(&self, side: Side, user: UserRecord) {
        let mut store = self.store(side).write().unwrap();
        store.users.insert(user.uid.clone(), user);
    }

    /// Test helper: read a document back for assertions.
    pub fn get_document(&self, side: Side, collection: &str, id: &str) -> Option<DocumentRecord> {
        let store = self.store(side).read().unwrap();
        store.collections.get(collection)?.get(id).cloned()
    }

    pub fn get_user_record(&self, side: Side, uid: &str) -> Option<UserRecord> {
        let store = self.store(side).read().unwrap();
        store.users.get(uid).cloned()
    }

    pub fn document_count(&self, side: Side, collection: &str) -> usize {
        let store = self.store(side).read().unwrap();
        store.collections.get(collection).map(|c| c.len()).unwrap_or(0)
    }

    pub fn document_ids(&self, side: Side, collection: &str) -> Vec<String> {
        let store = self.store(side).read().unwrap();
        store
            .collections
            .get(collection)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn user_uids(&self, side: Side) -> Vec<String> {
        let store = self.store(side).read().unwrap();
        store.users.keys().cloned().collect()
    }

    /// Force a simulated outage of `side`'s db or auth endpoint.
    pub fn set_down(&self, side: Side, kind: ProbeKind, down: bool) {
        let mut flags = self.down_flags(side).write().unwrap();
        match kind {
            ProbeKind::Db => flags.db = down,
            ProbeKind::Auth => flags.auth = down,
        }
    }

    fn check_up(&self, side: Side, kind: ProbeKind) -> EngineResult<()> {
        let flags = self.down_flags(side).read().unwrap();
        let down = match kind {
            ProbeKind::Db => flags.db,
            ProbeKind::Auth => flags.auth,
        };
        if down {
            Err(EngineError::Unavailable(format!("{} {:?} is down", side.as_str(), kind)))
        } else {
            Ok(())
        }
    }
}

fn merge_into(existing: &mut Value, patch: &Value) {
    if let (Value::Object(existing_map), Value::Object(patch_map)) = (existing, patch) {
        for (key, value) in patch_map {
            existing_map.insert(key.clone(), value.clone());
        }
    }
}

#[async_trait]
impl DbGateway for MemoryGateway {
    async fn list_collections(&self, side: Side) -> EngineResult<Vec<String>> {
        self.check_up(side, ProbeKind::Db)?;
        let store = self.store(side).read().unwrap();
        Ok(store.collections.keys().cloned().collect())
    }

    async fn scan_since(
        &self,
        side: Side,
        collection: &str,
        since: Option<&str>,
    ) -> EngineResult<Vec<DocumentRecord>> {
        self.check_up(side, ProbeKind::Db)?;
        let store = self.store(side).read().unwrap();
        let Some(docs) = store.collections.get(collection) else {
            return Ok(Vec::new());
        };
        let filtered = docs
            .values()
            .filter(|doc| match (since, doc.effective_timestamp()) {
                (Some(since), Some(ts)) => ts > since,
                (Some(_), None) => true,
                (None, _) => true,
            })
            .cloned()
            .collect();
        Ok(filtered)
    }

    async fn multi_get(
        &self,
        side: Side,
        collection: &str,
        ids: &[String],
    ) -> EngineResult<MultiGetResult> {
        self.check_up(side, ProbeKind::Db)?;
        let store = self.store(side).read().unwrap();
        let mut result = MultiGetResult::new();
        if let Some(docs) = store.collections.get(collection) {
            for id in ids {
                if let Some(doc) = docs.get(id) {
                    result.insert(id.clone(), doc.clone());
                }
            }
        }
        Ok(result)
    }

    async fn batch_write(
        &self,
        side: Side,
        collection: &str,
        writes: &[(String, Value)],
    ) -> EngineResult<()> {
        self.check_up(side, ProbeKind::Db)?;
        if writes.len() > BATCH_WRITE_LIMIT {
            return Err(EngineError::Invalid(format!(
                "batch of {} exceeds limit of {}",
                writes.len(),
                BATCH_WRITE_LIMIT
            )));
        }
        let mut store = self.store(side).write().unwrap();
        let target = store.collections.entry(collection.to_string()).or_default();
        for (id, patch) in writes {
            let merged = match target.get(id) {
                Some(existing) => {
                    let mut data = existing.data.clone();
                    merge_into(&mut data, patch);
                    data
                }
                None => patch.clone(),
            };
            target.insert(id.clone(), DocumentRecord::new(id.clone(), merged));
        }
        Ok(())
    }

    async fn list_users(&self, side: Side, page_token: Option<&str>) -> EngineResult<UserPage> {
        self.check_up(side, ProbeKind::Auth)?;
        let store = self.store(side).read().unwrap();
        let mut uids: Vec<&String> = store.users.keys().collect();
        uids.sort();

        let start = page_token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
        let end = (start + USER_PAGE_SIZE).min(uids.len());
        let page_uids = &uids[start.min(uids.len())..end];

        let users = page_uids
            .iter()
            .map(|uid| store.users.get(*uid).unwrap().clone())
            .collect();

        let next_page_token = if end < uids.len() { Some(end.to_string()) } else { None };

        Ok(UserPage { users, next_page_token })
    }

    async fn import_users(
        &self,
        side: Side,
        users: &[UserRecord],
        _hash_params: &HashParams,
    ) -> EngineResult<ImportOutcome> {
        self.check_up(side, ProbeKind::Auth)?;
        let mut store = self.store(side).write().unwrap();
        let mut outcome = ImportOutcome::default();
        for (index, user) in users.iter().enumerate() {
            if user.uid.is_empty() {
                outcome.failure_count += 1;
                outcome.errors.push(ImportError {
                    index,
                    reason: "missing uid".into(),
                });
                continue;
            }
            store.users.insert(user.uid.clone(), user.clone());
            outcome.success_count += 1;
        }
        Ok(outcome)
    }

    async fn set_custom_claims(
        &self,
        side: Side,
        uid: &str,
        claims: &Map<String, Value>,
    ) -> EngineResult<()> {
        self.check_up(side, ProbeKind::Auth)?;
        let mut store = self.store(side).write().unwrap();
        match store.users.get_mut(uid) {
            Some(user) => {
                user.custom_claims = claims.clone();
                Ok(())
            }
            None => Err(EngineError::PermanentPerRecord {
                id: uid.to_string(),
                reason: "user not found".into(),
            }),
        }
    }

    async fn get_user(&self, side: Side, uid: &str) -> EngineResult<Option<UserRecord>> {
        self.check_up(side, ProbeKind::Auth)?;
        let store = self.store(side).read().unwrap();
        Ok(store.users.get(uid).cloned())
    }

    async fn probe(&self, side: Side, kind: ProbeKind) -> bool {
        self.check_up(side, kind).is_ok()
    }
}
