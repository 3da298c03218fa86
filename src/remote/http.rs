// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! reqwest-backed [`CrmStore`] for the remote task-list CRM.
//!
//! # Endpoints
//!
//! ```text
//! GET    {base}/list/{list_id}/task?page=&page_size=&order_by=&reverse=&archived=
//! GET    {base}/list/{list_id}/field
//! POST   {base}/list/{list_id}/task        body {name, custom_fields}
//! GET    {base}/task/{id}
//! PUT    {base}/task/{id}                  body {name, custom_fields}
//! DELETE {base}/task/{id}
//! ```
//!
//! Every request carries a bearer credential and a JSON content type. Logs
//! carry method, path, status and latency; bodies and the credential never
//! appear in them.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::traits::{CrmStore, FieldDefinition, ListQuery, RecordPage, RemoteError, RemoteRecord};
use crate::config::CrmSyncConfig;
use crate::error::{SyncError, SyncResult};

/// Longest error body kept in an [`RemoteError::Http`] message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct TaskListResponse {
    #[serde(default)]
    tasks: Vec<RemoteRecord>,
    last_page: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct FieldListResponse {
    #[serde(default)]
    fields: Vec<FieldDefinition>,
}

#[derive(Clone)]
pub struct HttpCrmClient {
    base_url: String,
    list_id: String,
    token: String,
    http_client: Client,
}

impl std::fmt::Debug for HttpCrmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCrmClient")
            .field("base_url", &self.base_url)
            .field("list_id", &self.list_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl HttpCrmClient {
    /// Build a client from configuration. A missing credential or list id is
    /// a configuration error.
    pub fn new(config: &CrmSyncConfig) -> SyncResult<Self> {
        if config.api_token.trim().is_empty() {
            return Err(SyncError::Configuration("CRM API token is not set".into()));
        }
        if config.list_id.trim().is_empty() {
            return Err(SyncError::Configuration("CRM list id is not set".into()));
        }

        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(concat!("contact-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_http_client(
            config.base_url.clone(),
            config.list_id.trim(),
            config.api_token.trim(),
            http_client,
        ))
    }

    /// Create a client with a pre-built `reqwest::Client` (for testing).
    #[must_use]
    pub fn with_http_client(
        base_url: impl Into<String>,
        list_id: impl Into<String>,
        token: impl Into<String>,
        http_client: Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            list_id: list_id.into(),
            token: token.into(),
            http_client,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn list_id(&self) -> &str {
        &self.list_id
    }

    /// Custom field definitions of the target list, for resolving field ids
    /// and dropdown option ids at startup.
    pub async fn list_fields(&self) -> Result<Vec<FieldDefinition>, RemoteError> {
        let path = format!("/list/{}/field", self.list_id);
        let response = self.send("list_fields", Method::GET, &path, |b| b).await?;
        let body: FieldListResponse = parse_body(response).await?;
        Ok(body.fields)
    }

    // ── Internal HTTP ─────────────────────────────────────────────────

    async fn send(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response, RemoteError> {
        let url = format!("{}{}", self.base_url, path);
        let builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");

        let started = Instant::now();
        let sent = build(builder).send().await;
        let elapsed = started.elapsed();
        crate::metrics::record_remote_latency(operation, elapsed);

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                let err = classify_transport_error(&e);
                warn!(
                    method = %method,
                    path,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %err,
                    "CRM request failed"
                );
                crate::metrics::record_remote_request(operation, "error");
                crate::metrics::record_remote_error(operation, err.kind());
                return Err(err);
            }
        };

        let status = response.status();
        debug!(
            method = %method,
            path,
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "CRM request"
        );

        if status.is_success() {
            crate::metrics::record_remote_request(operation, "success");
            return Ok(response);
        }

        let err = error_from_response(path, response).await;
        if matches!(err, RemoteError::NotFound(_)) {
            crate::metrics::record_remote_request(operation, "not_found");
        } else {
            warn!(method = %method, path, status = status.as_u16(), error = %err, "CRM request rejected");
            crate::metrics::record_remote_request(operation, "error");
            crate::metrics::record_remote_error(operation, err.kind());
        }
        Err(err)
    }
}

#[async_trait]
impl CrmStore for HttpCrmClient {
    async fn create(&self, record: &RemoteRecord) -> Result<RemoteRecord, RemoteError> {
        let path = format!("/list/{}/task", self.list_id);
        let payload = record.payload();
        let response = self
            .send("create", Method::POST, &path, |b| b.json(&payload))
            .await?;
        parse_body(response).await
    }

    async fn get(&self, id: &str) -> Result<Option<RemoteRecord>, RemoteError> {
        let path = format!("/task/{id}");
        match self.send("get", Method::GET, &path, |b| b).await {
            Ok(response) => parse_body(response).await.map(Some),
            Err(RemoteError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update(&self, id: &str, record: &RemoteRecord) -> Result<RemoteRecord, RemoteError> {
        let path = format!("/task/{id}");
        let payload = record.payload();
        let response = self
            .send("update", Method::PUT, &path, |b| b.json(&payload))
            .await?;
        parse_body(response).await
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let path = format!("/task/{id}");
        match self.send("delete", Method::DELETE, &path, |b| b).await {
            Ok(_) => Ok(()),
            Err(RemoteError::NotFound(_)) => {
                debug!(id, "Delete of missing record treated as success");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn list(&self, query: &ListQuery) -> Result<RecordPage, RemoteError> {
        let path = format!("/list/{}/task", self.list_id);
        let params = [
            ("page", query.page.to_string()),
            ("page_size", query.page_size.to_string()),
            ("order_by", query.order_by.as_str().to_string()),
            ("reverse", query.reverse.to_string()),
            ("archived", query.include_archived.to_string()),
        ];
        let response = self
            .send("list", Method::GET, &path, |b| b.query(&params))
            .await?;
        let body: TaskListResponse = parse_body(response).await?;

        // Without an explicit flag a short page is the last one.
        let last_page = body
            .last_page
            .unwrap_or(body.tasks.len() < query.page_size.max(1));
        Ok(RecordPage {
            records: body.tasks,
            page: query.page,
            last_page,
        })
    }
}

async fn parse_body<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let body = response
        .text()
        .await
        .map_err(|e| RemoteError::Network(format!("failed to read response body: {e}")))?;
    serde_json::from_str(&body).map_err(|e| RemoteError::Parse(e.to_string()))
}

async fn error_from_response(path: &str, response: Response) -> RemoteError {
    let status = response.status();
    let retry_after_secs = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();

    if status == StatusCode::NOT_FOUND {
        return RemoteError::NotFound(path.to_string());
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!(retry_after_secs, "CRM rate limited");
    }
    RemoteError::Http {
        status: status.as_u16(),
        message: error_message(status, &body),
        retry_after_secs,
    }
}

/// Best-effort error text: a JSON `err`/`error`/`message` field, else the
/// raw body, else the status line.
fn error_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        ["err", "error", "message"]
            .iter()
            .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
    });
    let message = match from_json {
        Some(m) => m,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => format!("HTTP {status}"),
    };
    truncate(message, MAX_ERROR_BODY)
}

fn truncate(mut text: String, max: usize) -> String {
    if text.len() > max {
        let mut cut = max;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

fn classify_transport_error(error: &reqwest::Error) -> RemoteError {
    if error.is_timeout() {
        RemoteError::Timeout(error.to_string())
    } else {
        RemoteError::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_credentials() {
        let mut config = CrmSyncConfig::default();
        config.list_id = "901".into();
        assert!(matches!(HttpCrmClient::new(&config), Err(SyncError::Configuration(_))));

        config.api_token = "pk_test".into();
        config.list_id = " ".into();
        assert!(matches!(HttpCrmClient::new(&config), Err(SyncError::Configuration(_))));

        config.list_id = "901".into();
        let client = HttpCrmClient::new(&config).unwrap();
        assert_eq!(client.list_id(), "901");
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = HttpCrmClient::with_http_client("http://crm/", "1", "secret-token", Client::new());
        let printed = format!("{client:?}");
        assert!(!printed.contains("secret-token"));
        assert_eq!(client.base_url(), "http://crm");
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"err":"Custom field value invalid","ECODE":"FIELD_011"}"#),
            "Custom field value invalid"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "upstream down"), "upstream down");
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, ""), "HTTP 502 Bad Gateway");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "é".repeat(400);
        let cut = truncate(text, 513);
        assert_eq!(cut.len(), 512);
    }
}
