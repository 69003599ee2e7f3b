//! HTTP client for the CleverTap export API.
//!
//! Both the export-initiation call and the cursor poll hit
//! `{base}/1/{resource}.json`. The response body is kept as raw JSON and
//! interpreted through [`ExportResponse`], so unexpected shapes surface with
//! the original body attached.

use crate::config::{AccountCredentials, Endpoint, PollMethod};
use crate::error::{Result, SyncError};
use crate::types::Record;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

pub const ACCOUNT_ID_HEADER: &str = "X-CleverTap-Account-Id";
pub const PASSCODE_HEADER: &str = "X-CleverTap-Passcode";

/// Response `code` CleverTap uses for "export still processing".
pub const PROCESSING_CODE: i64 = 2;

const USER_AGENT: &str = concat!("source-clevertap/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// How a response body should be treated by the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyStatus {
    Success,
    /// `status == "fail"` with `code == 2`: retry the same cursor later.
    Processing,
    Failed,
}

/// A decoded JSON body from the export endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportResponse {
    body: Value,
}

impl ExportResponse {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    pub fn status(&self) -> Option<&str> {
        self.body.get("status").and_then(Value::as_str)
    }

    pub fn code(&self) -> Option<i64> {
        self.body.get("code").and_then(Value::as_i64)
    }

    pub fn classify(&self) -> BodyStatus {
        match self.status() {
            Some("success") => BodyStatus::Success,
            Some("fail") if self.code() == Some(PROCESSING_CODE) => BodyStatus::Processing,
            _ => BodyStatus::Failed,
        }
    }

    /// Cursor issued by the initiation call.
    pub fn cursor(&self) -> Option<&str> {
        non_empty_str(&self.body, "cursor")
    }

    /// Continuation cursor on a poll page. `next_cursor` wins over `cursor`.
    pub fn next_cursor(&self) -> Option<&str> {
        non_empty_str(&self.body, "next_cursor").or_else(|| self.cursor())
    }

    /// Records on a poll page, in API order. A missing `records` key is an
    /// empty page.
    pub fn records(&self) -> Result<Vec<Record>> {
        match self.body.get("records") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(map) => Ok(map.clone()),
                    other => Err(SyncError::Protocol(format!(
                        "record {} is not a JSON object: {}",
                        i, other
                    ))),
                })
                .collect(),
            Some(other) => Err(SyncError::Protocol(format!(
                "records field is not an array: {}",
                other
            ))),
        }
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }
}

fn non_empty_str<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// The two calls the pagination engine makes against the export API.
#[async_trait]
pub trait ExportApi: Send + Sync {
    /// Enqueue an export job. Returns the raw body, which should carry a
    /// cursor.
    async fn initiate_export(
        &self,
        resource: &str,
        payload: &Value,
        batch_size: Option<u32>,
    ) -> Result<ExportResponse>;

    /// Poll an export job with its current cursor.
    async fn poll_export(&self, resource: &str, cursor: &str) -> Result<ExportResponse>;
}

/// HTTP client for the CleverTap REST API.
///
/// Authenticates every request with the account id and passcode headers.
pub struct CleverTapClient {
    http_client: Client,
    endpoint: Endpoint,
    credentials: AccountCredentials,
    poll_method: PollMethod,
}

impl CleverTapClient {
    pub fn new(
        endpoint: Endpoint,
        credentials: AccountCredentials,
        poll_method: PollMethod,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http_client,
            endpoint,
            credentials,
            poll_method,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(ACCOUNT_ID_HEADER, &self.credentials.account_id)
            .header(PASSCODE_HEADER, &self.credentials.passcode)
    }

    async fn send(&self, request: RequestBuilder) -> Result<ExportResponse> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        let text = response.text().await?;
        check_response_status(status, &text)?;
        parse_body(&text)
    }
}

#[async_trait]
impl ExportApi for CleverTapClient {
    async fn initiate_export(
        &self,
        resource: &str,
        payload: &Value,
        batch_size: Option<u32>,
    ) -> Result<ExportResponse> {
        let url = self.endpoint.resource_url(resource);
        let mut request = self.http_client.post(&url).json(payload);
        if let Some(size) = batch_size {
            request = request.query(&[("batch_size", size)]);
        }
        self.send(request).await
    }

    async fn poll_export(&self, resource: &str, cursor: &str) -> Result<ExportResponse> {
        let url = self.endpoint.resource_url(resource);
        let request = match self.poll_method {
            PollMethod::Post => self.http_client.post(&url).json(&json!({ "cursor": cursor })),
            PollMethod::Get => self
                .http_client
                .get(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .query(&[("cursor", cursor)]),
        };
        self.send(request).await
    }
}

/// Map a non-2xx status to a transport error carrying the body for context.
///
/// - 401 / 403 → credentials rejected
/// - 429 → rate limited
/// - other non-2xx → generic API error
fn check_response_status(status: StatusCode, body: &str) -> Result<()> {
    let message = match status {
        s if s.is_success() => return Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            format!("CleverTap rejected credentials: {}", body)
        }
        StatusCode::TOO_MANY_REQUESTS => format!("CleverTap rate limit exceeded: {}", body),
        s => format!("CleverTap API error {}: {}", s, body),
    };
    Err(SyncError::Transport {
        status: Some(status.as_u16()),
        message,
    })
}

fn parse_body(text: &str) -> Result<ExportResponse> {
    let body = serde_json::from_str::<Value>(text).map_err(|e| {
        SyncError::Protocol(format!("response body is not valid JSON ({}): {}", e, text))
    })?;
    Ok(ExportResponse::new(body))
}
