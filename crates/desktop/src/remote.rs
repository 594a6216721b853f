//! Remote store adapter.
//!
//! [`RemoteStore`] is everything the sync core needs from the hosted database:
//! insert, update and delete against a named table. [`RestRemoteStore`] speaks
//! the hosted service's REST dialect (`/rest/v1/{table}`, `?id=eq.{id}` row
//! filters, `Prefer: return=representation`).

use async_trait::async_trait;
use disasterconnect_core::{Fields, Mutation};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;

use crate::config::SyncConfig;

/// A row as returned by the remote store.
pub type Record = Value;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({0}): {1}")]
    Api(u16, String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("no {table} row matched id {id}")]
    NotFound { table: String, id: String },
}

/// Insert/update/delete against remote tables.
///
/// Each call is atomic from the caller's point of view. Timeouts are the
/// implementation's business: the sync engine awaits calls unbounded.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn insert(&self, table: &str, fields: &Fields) -> Result<Record, RemoteError>;

    async fn update(&self, table: &str, id: &str, fields: &Fields) -> Result<Record, RemoteError>;

    async fn delete(&self, table: &str, id: &str) -> Result<(), RemoteError>;
}

/// Dispatch one mutation to the matching remote call.
///
/// Returns the affected record for inserts and updates.
pub async fn apply<R>(remote: &R, table: &str, mutation: &Mutation) -> Result<Option<Record>, RemoteError>
where
    R: RemoteStore + ?Sized,
{
    match mutation {
        Mutation::Insert { fields } => remote.insert(table, fields).await.map(Some),
        Mutation::Update { id, fields } => remote.update(table, id, fields).await.map(Some),
        Mutation::Delete { id } => remote.delete(table, id).await.map(|()| None),
    }
}

/// HTTP client for the hosted REST endpoint.
#[derive(Debug, Clone)]
pub struct RestRemoteStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl RestRemoteStore {
    pub fn new(config: &SyncConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    async fn send(req: RequestBuilder) -> Result<Response, RemoteError> {
        let resp = req
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(RemoteError::Api(status, resp.text().await.unwrap_or_default()));
        }

        Ok(resp)
    }

    /// Representation responses are arrays of rows; take the first one.
    async fn first_row(resp: Response) -> Result<Option<Record>, RemoteError> {
        let body: Value = resp
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;

        match body {
            Value::Array(rows) => Ok(rows.into_iter().next()),
            Value::Object(_) => Ok(Some(body)),
            other => Err(RemoteError::Parse(format!("unexpected response body: {other}"))),
        }
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn insert(&self, table: &str, fields: &Fields) -> Result<Record, RemoteError> {
        let req = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(fields);

        let resp = Self::send(req).await?;
        Self::first_row(resp)
            .await?
            .ok_or_else(|| RemoteError::Parse(format!("insert into {table} returned no row")))
    }

    async fn update(&self, table: &str, id: &str, fields: &Fields) -> Result<Record, RemoteError> {
        let req = self
            .request(Method::PATCH, table)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(fields);

        let resp = Self::send(req).await?;
        Self::first_row(resp).await?.ok_or_else(|| RemoteError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        })
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), RemoteError> {
        let req = self
            .request(Method::DELETE, table)
            .query(&[("id", format!("eq.{id}"))]);

        Self::send(req).await?;
        Ok(())
    }
}
