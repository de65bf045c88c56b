//! Reconciler (§4.8): compares ID sets between primary and standby, and UID
//! sets between the two auth directories, without modifying either side.

use serde::Serialize;

use crate::error::EngineResult;
use crate::events::{Event, EventBus};
use crate::gateway::traits::DbGateway;
use crate::gateway::types::Side;

/// Per-collection (or per-auth-directory) integrity comparison result.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IntegrityReport {
    pub collection: String,
    #[serde(rename = "primaryCount")]
    pub primary_count: usize,
    #[serde(rename = "standbyCount")]
    pub standby_count: usize,
    #[serde(rename = "missingInStandby")]
    pub missing_in_standby: Vec<String>,
    #[serde(rename = "missingInPrimary")]
    pub missing_in_primary: Vec<String>,
}

impl IntegrityReport {
    fn from_id_sets(collection: &str, primary_ids: Vec<String>, standby_ids: Vec<String>) -> Self {
        let primary_set: std::collections::HashSet<&String> = primary_ids.iter().collect();
        let standby_set: std::collections::HashSet<&String> = standby_ids.iter().collect();

        let mut missing_in_standby: Vec<String> = primary_set.difference(&standby_set).map(|s| s.to_string()).collect();
        let mut missing_in_primary: Vec<String> = standby_set.difference(&primary_set).map(|s| s.to_string()).collect();
        missing_in_standby.sort();
        missing_in_primary.sort();

        Self {
            collection: collection.to_string(),
            primary_count: primary_ids.len(),
            standby_count: standby_ids.len(),
            missing_in_standby,
            missing_in_primary,
        }
    }
}

/// Compares document ID sets for one collection (§4.8). Reconciliation never
/// writes; it only reports.
pub async fn reconcile_collection(gateway: &dyn DbGateway, collection: &str) -> EngineResult<IntegrityReport> {
    let primary_ids = gateway.scan_since(Side::Primary, collection, None).await?.into_iter().map(|d| d.id).collect();
    let standby_ids = gateway.scan_since(Side::Standby, collection, None).await?.into_iter().map(|d| d.id).collect();

    Ok(IntegrityReport::from_id_sets(collection, primary_ids, standby_ids))
}

/// Compares UID sets between the two auth directories. Uses `ListUsers`
/// pagination on both sides rather than `ScanSince`, since users have no
/// collection to scan.
pub async fn reconcile_auth(gateway: &dyn DbGateway) -> EngineResult<IntegrityReport> {
    let primary_uids = list_all_uids(gateway, Side::Primary).await?;
    let standby_uids = list_all_uids(gateway, Side::Standby).await?;

    Ok(IntegrityReport::from_id_sets("__auth__", primary_uids, standby_uids))
}

async fn list_all_uids(gateway: &dyn DbGateway, side: Side) -> EngineResult<Vec<String>> {
    let mut uids = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let page = gateway.list_users(side, page_token.as_deref()).await?;
        uids.extend(page.users.into_iter().map(|u| u.uid));
        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }
    Ok(uids)
}

/// Runs [`reconcile_collection`] over every named collection and publishes
/// an `integrityReport` event per collection.
pub async fn reconcile_all(gateway: &dyn DbGateway, events: &EventBus, collections: &[String]) -> EngineResult<Vec<IntegrityReport>> {
    let mut reports = Vec::with_capacity(collections.len());
    for collection in collections {
        let report = reconcile_collection(gateway, collection).await?;
        events.publish(Event::IntegrityReport(report.clone()));
        reports.push(report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::MemoryGateway;
    use crate::gateway::types::UserRecord;
    use serde_json::json;

    #[tokio::test]
    async fn reports_divergence_both_directions() {
        let gw = MemoryGateway::new();
        gw.seed_document(Side::Primary, "appointments", "a1", json!({}));
        gw.seed_document(Side::Primary, "appointments", "a2", json!({}));
        gw.seed_document(Side::Primary, "appointments", "a8", json!({}));
        gw.seed_document(Side::Standby, "appointments", "a1", json!({}));
        gw.seed_document(Side::Standby, "appointments", "a2", json!({}));
        gw.seed_document(Side::Standby, "appointments", "a9", json!({}));

        let report = reconcile_collection(&gw, "appointments").await.unwrap();

        assert_eq!(report.primary_count, 3);
        assert_eq!(report.standby_count, 3);
        assert_eq!(report.missing_in_standby, vec!["a8".to_string()]);
        assert_eq!(report.missing_in_primary, vec!["a9".to_string()]);
    }

    #[tokio::test]
    async fn matching_sides_report_no_divergence() {
        let gw = MemoryGateway::new();
        gw.seed_document(Side::Primary, "c", "a1", json!({}));
        gw.seed_document(Side::Standby, "c", "a1", json!({}));

        let report = reconcile_collection(&gw, "c").await.unwrap();
        assert!(report.missing_in_standby.is_empty());
        assert!(report.missing_in_primary.is_empty());
    }

    #[tokio::test]
    async fn auth_reconcile_compares_uids() {
        let gw = MemoryGateway::new();
        gw.seed_user(Side::Primary, UserRecord { uid: "u1".into(), ..Default::default() });
        gw.seed_user(Side::Standby, UserRecord { uid: "u2".into(), ..Default::default() });

        let report = reconcile_auth(&gw).await.unwrap();
        assert_eq!(report.missing_in_standby, vec!["u1".to_string()]);
        assert_eq!(report.missing_in_primary, vec!["u2".to_string()]);
    }

    #[tokio::test]
    async fn reconcile_all_never_mutates_either_side() {
        let gw = MemoryGateway::new();
        gw.seed_document(Side::Primary, "c", "a1", json!({}));
        let events = EventBus::new(16);

        reconcile_all(&gw, &events, &["c".to_string()]).await.unwrap();

        assert!(gw.get_document(Side::Standby, "c", "a1").is_none());
        assert_eq!(gw.document_count(Side::Primary, "c"), 1);
    }
}
