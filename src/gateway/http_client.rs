//! HTTP-backed `DbGateway`: talks to each side's document-store and
//! auth-directory endpoint over a plain REST contract.
//!
//! The engine does not assume a specific vendor's wire format. It expects
//! each endpoint to expose the small set of operations in §4.1 behind
//! ordinary JSON HTTP — a thin REST facade is part of the deployment, not
//! this crate. Retries for transient failures happen one layer up, in
//! [`super::retry::with_retry`]; this client only classifies errors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::EndpointConfig;
use crate::error::{EngineError, EngineResult};

use super::traits::DbGateway;
use super::types::{DocumentRecord, HashParams, ImportOutcome, MultiGetResult, ProbeKind, Side, UserPage, UserRecord};

/// Deadlines per §5: reads default to 30s, batch writes 60s, user imports 120s.
#[derive(Debug, Clone, Copy)]
pub struct Deadlines {
    pub read: Duration,
    pub batch_write: Duration,
    pub user_import: Duration,
    pub probe: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(30),
            batch_write: Duration::from_secs(60),
            user_import: Duration::from_secs(120),
            probe: Duration::from_secs(5),
        }
    }
}

/// An HTTP-backed gateway for a single primary/standby pair. Each side's base
/// URL and bearer token are supplied by [`EndpointConfig`].
pub struct HttpGateway {
    client: Client,
    primary: EndpointConfig,
    standby: EndpointConfig,
    deadlines: Deadlines,
}

impl HttpGateway {
    pub fn new(primary: EndpointConfig, standby: EndpointConfig) -> Self {
        Self::with_deadlines(primary, standby, Deadlines::default())
    }

    pub fn with_deadlines(primary: EndpointConfig, standby: EndpointConfig, deadlines: Deadlines) -> Self {
        Self {
            client: Client::new(),
            primary,
            standby,
            deadlines,
        }
    }

    fn endpoint(&self, side: Side) -> &EndpointConfig {
        match side {
            Side::Primary => &self.primary,
            Side::Standby => &self.standby,
        }
    }

    fn url(&self, side: Side, path: &str) -> String {
        format!("{}{}", self.endpoint(side).base_url.trim_end_matches('/'), path)
    }

    async fn classify_response(resp: reqwest::Response) -> EngineResult<reqwest::Response> {
        match resp.status() {
            s if s.is_success() => Ok(resp),
            StatusCode::TOO_MANY_REQUESTS => Err(EngineError::Throttled(format!("status {s}"))),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(EngineError::Invalid(format!("status {s}")))
            }
            s if s.is_server_error() => Err(EngineError::Unavailable(format!("status {s}"))),
            s => Err(EngineError::Unavailable(format!("status {s}"))),
        }
    }

    fn classify_transport_error(err: reqwest::Error) -> EngineError {
        if err.is_timeout() || err.is_connect() {
            EngineError::Unavailable(err.to_string())
        } else if err.is_decode() {
            EngineError::Invalid(err.to_string())
        } else {
            EngineError::Unavailable(err.to_string())
        }
    }

    fn bearer(&self, side: Side, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.endpoint(side).bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[derive(Deserialize)]
struct ListCollectionsResponse {
    collections: Vec<String>,
}

#[derive(Serialize)]
struct ScanSinceRequest<'a> {
    collection: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    since: Option<&'a str>,
}

#[derive(Deserialize)]
struct ScanSinceResponse {
    documents: Vec<RawDocument>,
}

#[derive(Deserialize)]
struct RawDocument {
    id: String,
    data: Value,
}

#[derive(Serialize)]
struct MultiGetRequest<'a> {
    collection: &'a str,
    ids: &'a [String],
}

#[derive(Deserialize)]
struct MultiGetResponse {
    documents: Vec<RawDocument>,
}

#[derive(Serialize)]
struct BatchWriteRequest<'a> {
    collection: &'a str,
    writes: &'a [(String, Value)],
}

#[derive(Deserialize)]
struct ListUsersResponse {
    users: Vec<UserRecord>,
    next_page_token: Option<String>,
}

#[derive(Serialize)]
struct ImportUsersRequest<'a> {
    users: &'a [UserRecord],
    hash_params: &'a HashParams,
}

#[derive(Serialize)]
struct SetClaimsRequest<'a> {
    claims: &'a Map<String, Value>,
}

#[async_trait]
impl DbGateway for HttpGateway {
    async fn list_collections(&self, side: Side) -> EngineResult<Vec<String>> {
        let req = self.bearer(side, self.client.get(self.url(side, "/collections")));
        let resp = req
            .timeout(self.deadlines.read)
            .send()
            .await
            .map_err(Self::classify_transport_error)?;
        let resp = Self::classify_response(resp).await?;
        let body: ListCollectionsResponse = resp.json().await.map_err(Self::classify_transport_error)?;
        Ok(body.collections)
    }

    async fn scan_since(
        &self,
        side: Side,
        collection: &str,
        since: Option<&str>,
    ) -> EngineResult<Vec<DocumentRecord>> {
        let req = self.bearer(side, self.client.post(self.url(side, "/documents/scan")));
        let resp = req
            .timeout(self.deadlines.read)
            .json(&ScanSinceRequest { collection, since })
            .send()
            .await
            .map_err(Self::classify_transport_error)?;
        let resp = Self::classify_response(resp).await?;
        let body: ScanSinceResponse = resp.json().await.map_err(Self::classify_transport_error)?;
        Ok(body
            .documents
            .into_iter()
            .map(|raw| DocumentRecord::new(raw.id, raw.data))
            .collect())
    }

    async fn multi_get(
        &self,
        side: Side,
        collection: &str,
        ids: &[String],
    ) -> EngineResult<MultiGetResult> {
        let req = self.bearer(side, self.client.post(self.url(side, "/documents/get")));
        let resp = req
            .timeout(self.deadlines.read)
            .json(&MultiGetRequest { collection, ids })
            .send()
            .await
            .map_err(Self::classify_transport_error)?;
        let resp = Self::classify_response(resp).await?;
        let body: MultiGetResponse = resp.json().await.map_err(Self::classify_transport_error)?;
        Ok(body
            .documents
            .into_iter()
            .map(|raw| (raw.id.clone(), DocumentRecord::new(raw.id, raw.data)))
            .collect())
    }

    async fn batch_write(
        &self,
        side: Side,
        collection: &str,
        writes: &[(String, Value)],
    ) -> EngineResult<()> {
        use super::traits::BATCH_WRITE_LIMIT;
        if writes.len() > BATCH_WRITE_LIMIT {
            return Err(EngineError::Invalid(format!(
                "batch of {} exceeds limit of {}",
                writes.len(),
                BATCH_WRITE_LIMIT
            )));
        }
        let req = self.bearer(side, self.client.post(self.url(side, "/documents/batch_write")));
        let resp = req
            .timeout(self.deadlines.batch_write)
            .json(&BatchWriteRequest { collection, writes })
            .send()
            .await
            .map_err(Self::classify_transport_error)?;
        Self::classify_response(resp).await?;
        Ok(())
    }

    async fn list_users(&self, side: Side, page_token: Option<&str>) -> EngineResult<UserPage> {
        let mut req = self.bearer(side, self.client.get(self.url(side, "/auth/users")));
        if let Some(token) = page_token {
            req = req.query(&[("page_token", token)]);
        }
        let resp = req
            .timeout(self.deadlines.read)
            .send()
            .await
            .map_err(Self::classify_transport_error)?;
        let resp = Self::classify_response(resp).await?;
        let body: ListUsersResponse = resp.json().await.map_err(Self::classify_transport_error)?;
        Ok(UserPage {
            users: body.users,
            next_page_token: body.next_page_token,
        })
    }

    async fn import_users(
        &self,
        side: Side,
        users: &[UserRecord],
        hash_params: &HashParams,
    ) -> EngineResult<ImportOutcome> {
        let req = self.bearer(side, self.client.post(self.url(side, "/auth/users/import")));
        let resp = req
            .timeout(self.deadlines.user_import)
            .json(&ImportUsersRequest { users, hash_params })
            .send()
            .await
            .map_err(Self::classify_transport_error)?;
        let resp = Self::classify_response(resp).await?;
        let body: ImportOutcome = resp.json().await.map_err(Self::classify_transport_error)?;
        Ok(body)
    }

    async fn set_custom_claims(
        &self,
        side: Side,
        uid: &str,
        claims: &Map<String, Value>,
    ) -> EngineResult<()> {
        let req = self.bearer(
            side,
            self.client
                .post(self.url(side, &format!("/auth/users/{uid}/claims"))),
        );
        let resp = req
            .timeout(self.deadlines.read)
            .json(&SetClaimsRequest { claims })
            .send()
            .await
            .map_err(Self::classify_transport_error)?;
        Self::classify_response(resp).await?;
        Ok(())
    }

    async fn get_user(&self, side: Side, uid: &str) -> EngineResult<Option<UserRecord>> {
        let req = self.bearer(side, self.client.get(self.url(side, &format!("/auth/users/{uid}"))));
        let resp = req
            .timeout(self.deadlines.read)
            .send()
            .await
            .map_err(Self::classify_transport_error)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = Self::classify_response(resp).await?;
        let user: UserRecord = resp.json().await.map_err(Self::classify_transport_error)?;
        Ok(Some(user))
    }

    async fn probe(&self, side: Side, kind: ProbeKind) -> bool {
        let path = match kind {
            ProbeKind::Db => "/collections",
            ProbeKind::Auth => "/auth/users",
        };
        let req = self.bearer(side, self.client.get(self.url(side, path)));
        matches!(
            req.timeout(self.deadlines.probe).send().await,
            Ok(resp) if resp.status().is_success()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_path() {
        let gw = HttpGateway::new(
            EndpointConfig { base_url: "https://primary.example.com/".into(), bearer_token: None },
            EndpointConfig { base_url: "https://standby.example.com".into(), bearer_token: None },
        );
        assert_eq!(gw.url(Side::Primary, "/collections"), "https://primary.example.com/collections");
        assert_eq!(gw.url(Side::Standby, "/collections"), "https://standby.example.com/collections");
    }
}
