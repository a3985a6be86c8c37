//! HTTP implementation of [`Backend`] against a PostgREST-style project:
//! `/rest/v1` for tables, `/storage/v1` for objects, `/auth/v1` for auth
//! and `/realtime/v1` for change subscriptions.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use bazaar_shared::query::{Filter, Query};
use bazaar_shared::{AuthUser, Session, Table};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::remote::{realtime, Backend, Subscription};

pub struct RestBackend {
    http: reqwest::Client,
    base: Url,
    anon_key: String,
    heartbeat: Duration,
    session: RwLock<Option<Session>>,
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

/// Error body shapes used by the REST, auth and storage services.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
    }
}

impl RestBackend {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut base = Url::parse(&config.backend_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base,
            anon_key: config.anon_key.clone(),
            heartbeat: Duration::from_secs(config.heartbeat_secs),
            session: RwLock::new(None),
        })
    }

    /// Resume a previously stored session.
    pub async fn set_session(&self, session: Option<Session>) {
        *self.session.write().await = session;
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    fn table_url(&self, table: Table) -> Result<Url> {
        self.endpoint(&format!("rest/v1/{table}"))
    }

    /// Attach the api key and the bearer token (session token when signed
    /// in, the anon key otherwise).
    async fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        let token = match self.session.read().await.as_ref() {
            Some(s) => s.access_token.clone(),
            None => self.anon_key.clone(),
        };
        req.header("apikey", &self.anon_key).bearer_auth(token)
    }

    async fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.authorize(self.http.request(method, url)).await
    }

    /// Send and map non-2xx statuses to [`ClientError::Remote`].
    async fn send(req: RequestBuilder) -> Result<Response> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or(text);

        warn!(status = status.as_u16(), %message, "backend request failed");
        Err(ClientError::Remote {
            status: status.as_u16(),
            message,
        })
    }

    async fn rows(resp: Response) -> Result<Vec<Value>> {
        match resp.json::<Value>().await? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            row @ Value::Object(_) => Ok(vec![row]),
            other => Err(ClientError::UnexpectedResponse(format!(
                "expected rows, got {other}"
            ))),
        }
    }

    fn filter_params(filters: &[Filter], table: Table) -> Result<Vec<(String, String)>> {
        let mut query = Query::table(table);
        query.filters = filters.to_vec();
        // drop the `select=*` entry; callers add their own
        Ok(query.to_params()?.into_iter().skip(1).collect())
    }

    fn realtime_url(&self) -> Result<Url> {
        let mut url = self.endpoint("realtime/v1/websocket")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::Config(format!("cannot derive websocket URL from {url}")))?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.anon_key)
            .append_pair("vsn", bazaar_shared::constants::REALTIME_VSN);
        Ok(url)
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        let params = query.to_params()?;
        debug!(table = %query.table, ?params, "select");

        let req = self
            .request(Method::GET, self.table_url(query.table)?)
            .await
            .query(&params);
        Self::rows(Self::send(req).await?).await
    }

    async fn insert(&self, table: Table, rows: Value) -> Result<Vec<Value>> {
        let req = self
            .request(Method::POST, self.table_url(table)?)
            .await
            .header("Prefer", "return=representation")
            .json(&rows);
        let stored = Self::rows(Self::send(req).await?).await?;
        info!(%table, rows = stored.len(), "inserted");
        Ok(stored)
    }

    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> Result<Vec<Value>> {
        let params = Self::filter_params(filters, table)?;
        let req = self
            .request(Method::PATCH, self.table_url(table)?)
            .await
            .query(&params)
            .header("Prefer", "return=representation")
            .json(&patch);
        let updated = Self::rows(Self::send(req).await?).await?;
        info!(%table, rows = updated.len(), "updated");
        Ok(updated)
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<usize> {
        let params = Self::filter_params(filters, table)?;
        let req = self
            .request(Method::DELETE, self.table_url(table)?)
            .await
            .query(&params)
            .header("Prefer", "return=representation");
        let deleted = Self::rows(Self::send(req).await?).await?.len();
        info!(%table, rows = deleted, "deleted");
        Ok(deleted)
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<String> {
        let size = data.len();
        let url = self.endpoint(&format!("storage/v1/object/{bucket}/{path}"))?;
        let req = self
            .request(Method::POST, url)
            .await
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(data);
        Self::send(req).await?;

        let public = self.endpoint(&format!("storage/v1/object/public/{bucket}/{path}"))?;
        info!(bucket, path, size, "uploaded object");
        Ok(public.to_string())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser> {
        let req = self
            .request(Method::POST, self.endpoint("auth/v1/signup")?)
            .await
            .json(&json!({ "email": email, "password": password }));
        let body: Value = Self::send(req).await?.json().await?;

        // With email confirmation on, the user comes back bare; otherwise
        // inside a full session.
        let user_value = body.get("user").cloned().unwrap_or(body);
        let user: AuthUser = serde_json::from_value(user_value)?;
        info!(user_id = %user.id, "signed up");
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let req = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }));
        let session: Session = Self::send(req).await?.json().await?;

        info!(user_id = %session.user.id, "signed in");
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        if self.session.read().await.is_none() {
            return Ok(());
        }
        let req = self
            .request(Method::POST, self.endpoint("auth/v1/logout")?)
            .await;
        let result = Self::send(req).await;
        // The local session goes regardless of what the server says.
        *self.session.write().await = None;
        result.map(|_| info!("signed out"))
    }

    async fn current_user(&self) -> Result<Option<AuthUser>> {
        if self.session.read().await.is_none() {
            return Ok(None);
        }
        let req = self
            .request(Method::GET, self.endpoint("auth/v1/user")?)
            .await;
        match Self::send(req).await {
            Ok(resp) => Ok(Some(resp.json().await?)),
            Err(ClientError::Remote { status: 401, .. }) => {
                *self.session.write().await = None;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn subscribe(&self, table: Table) -> Result<Subscription> {
        let url = self.realtime_url()?;
        let token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone());
        realtime::subscribe(url, table, token, self.heartbeat).await
    }
}
