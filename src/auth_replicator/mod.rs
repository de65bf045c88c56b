//! Auth Replicator (§4.6): paginated export from primary's auth directory,
//! bulk import into standby's, then custom-claims propagation.

use crate::error::EngineResult;
use crate::events::{AuthPhase, Event, EventBus};
use crate::gateway::traits::{DbGateway, USER_PAGE_SIZE};
use crate::gateway::types::{HashParams, Side, UserRecord};
use crate::observability::{Logger, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthReplicationMode {
    Full,
    /// Client-side filtered by `creationTime`/`lastSignInTime` against the
    /// given threshold, since the directory's list API is not itself
    /// filterable by time (§4.6 rationale).
    Incremental,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthReplicationOutcome {
    pub total_users: usize,
    pub synced_users: usize,
    pub custom_claims_propagated: usize,
    pub errors: usize,
}

/// Runs `ReplicateAuth(mode)`. `since` is only consulted for
/// [`AuthReplicationMode::Incremental`] and should be the timestamp of the
/// last primary-side auth run.
pub async fn replicate_auth(
    gateway: &dyn DbGateway,
    events: &EventBus,
    mode: AuthReplicationMode,
    since: Option<&str>,
    hash_params: &HashParams,
) -> EngineResult<AuthReplicationOutcome> {
    let all_users = export_all_users(gateway, events).await?;

    let candidates: Vec<UserRecord> = match mode {
        AuthReplicationMode::Full => all_users,
        AuthReplicationMode::Incremental => all_users
            .into_iter()
            .filter(|user| match (since, user.activity_watermark()) {
                (Some(since), Some(activity)) => activity > since,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .collect(),
    };

    let mut outcome = AuthReplicationOutcome {
        total_users: candidates.len(),
        ..Default::default()
    };

    let mut imported: Vec<UserRecord> = Vec::new();
    let mut imported_so_far = 0usize;
    let total_to_import = candidates.len();

    for chunk in candidates.chunks(USER_PAGE_SIZE) {
        match gateway.import_users(Side::Standby, chunk, hash_params).await {
            Ok(result) => {
                outcome.synced_users += result.success_count;
                outcome.errors += result.failure_count;
                for err in &result.errors {
                    Logger::log(
                        Severity::Warn,
                        "userImportFailed",
                        &[("index", err.index.to_string().as_str()), ("reason", err.reason.as_str())],
                    );
                }
                let failed_indices: std::collections::HashSet<usize> = result.errors.iter().map(|e| e.index).collect();
                for (index, user) in chunk.iter().enumerate() {
                    if !failed_indices.contains(&index) {
                        imported.push(user.clone());
                    }
                }
            }
            Err(err) => {
                outcome.errors += chunk.len();
                let reason = err.to_string();
                Logger::error("authImportBatchFailed", &[("batchSize", chunk.len().to_string().as_str()), ("reason", reason.as_str())]);
            }
        }

        imported_so_far += chunk.len();
        events.publish(Event::AuthProgress {
            phase: AuthPhase::Import,
            user_count: imported_so_far.min(total_to_import),
            of_total: total_to_import,
        });
    }

    for user in &imported {
        if user.custom_claims.is_empty() {
            continue;
        }
        match gateway.set_custom_claims(Side::Standby, &user.uid, &user.custom_claims).await {
            Ok(()) => outcome.custom_claims_propagated += 1,
            Err(err) => {
                outcome.errors += 1;
                let reason = err.to_string();
                Logger::error("setCustomClaimsFailed", &[("uid", user.uid.as_str()), ("reason", reason.as_str())]);
            }
        }
    }

    events.publish(Event::AuthCompleted {
        total_users: outcome.total_users,
        synced_users: outcome.synced_users,
        custom_claims_propagated: outcome.custom_claims_propagated,
        errors: outcome.errors,
        timestamp: chrono::Utc::now(),
    });

    Ok(outcome)
}

async fn export_all_users(gateway: &dyn DbGateway, events: &EventBus) -> EngineResult<Vec<UserRecord>> {
    let mut all_users = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = gateway.list_users(Side::Primary, page_token.as_deref()).await?;
        all_users.extend(page.users);

        events.publish(Event::AuthProgress {
            phase: AuthPhase::Export,
            user_count: all_users.len(),
            of_total: all_users.len(),
        });

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(all_users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::MemoryGateway;

    fn user(uid: &str) -> UserRecord {
        UserRecord {
            uid: uid.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn full_mode_imports_all_users() {
        let gw = MemoryGateway::new();
        gw.seed_user(Side::Primary, user("u1"));
        gw.seed_user(Side::Primary, user("u2"));

        let events = EventBus::new(64);
        let outcome = replicate_auth(&gw, &events, AuthReplicationMode::Full, None, &HashParams::default())
            .await
            .unwrap();

        assert_eq!(outcome.total_users, 2);
        assert_eq!(outcome.synced_users, 2);
        assert!(gw.get_user_record(Side::Standby, "u1").is_some());
        assert!(gw.get_user_record(Side::Standby, "u2").is_some());
    }

    #[tokio::test]
    async fn custom_claims_are_propagated_after_import() {
        let gw = MemoryGateway::new();
        let mut claims = serde_json::Map::new();
        claims.insert("role".to_string(), serde_json::json!("admin"));
        gw.seed_user(
            Side::Primary,
            UserRecord {
                uid: "u1".into(),
                custom_claims: claims,
                ..Default::default()
            },
        );

        let events = EventBus::new(64);
        let outcome = replicate_auth(&gw, &events, AuthReplicationMode::Full, None, &HashParams::default())
            .await
            .unwrap();

        assert_eq!(outcome.custom_claims_propagated, 1);
        let standby_user = gw.get_user_record(Side::Standby, "u1").unwrap();
        assert_eq!(standby_user.custom_claims.get("role"), Some(&serde_json::json!("admin")));
    }

    #[tokio::test]
    async fn incremental_mode_filters_by_activity_watermark() {
        let gw = MemoryGateway::new();
        gw.seed_user(
            Side::Primary,
            UserRecord {
                uid: "stale".into(),
                last_sign_in_time: Some("2024-01-01T00:00:00Z".into()),
                ..Default::default()
            },
        );
        gw.seed_user(
            Side::Primary,
            UserRecord {
                uid: "fresh".into(),
                last_sign_in_time: Some("2024-06-01T00:00:00Z".into()),
                ..Default::default()
            },
        );

        let events = EventBus::new(64);
        let outcome = replicate_auth(
            &gw,
            &events,
            AuthReplicationMode::Incremental,
            Some("2024-03-01T00:00:00Z"),
            &HashParams::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.total_users, 1);
        assert!(gw.get_user_record(Side::Standby, "fresh").is_some());
        assert!(gw.get_user_record(Side::Standby, "stale").is_none());
    }

    #[tokio::test]
    async fn no_users_is_a_clean_no_op() {
        let gw = MemoryGateway::new();
        let events = EventBus::new(64);
        let outcome = replicate_auth(&gw, &events, AuthReplicationMode::Full, None, &HashParams::default())
            .await
            .unwrap();

        assert_eq!(outcome, AuthReplicationOutcome::default());
    }
}
