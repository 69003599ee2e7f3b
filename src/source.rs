//! Harness-facing surface of the connector.
//!
//! [`SourceCleverTap`] turns a raw config into [`ExportStream`]s, answers
//! connection checks and describes the catalog. Each [`ExportStream`] exposes
//! the stream's name, primary key, schema and a lazy read.

use crate::api::{CleverTapClient, ExportApi};
use crate::config::{
    Endpoint, SessionConfig, SourceConfig, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS,
};
use crate::error::{ConfigError, Result, SyncError};
use crate::pagination::ExportReader;
use crate::registry::{find_resource, get_all_resources};
use crate::resources::{Events, Resource};
use crate::schema::builtin_schema;
use crate::types::{Catalog, ConnectionStatus, Record, StreamDescriptor};
use chrono::NaiveDate;
use futures::stream::BoxStream;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A readable CleverTap stream.
pub struct ExportStream {
    reader: ExportReader,
}

impl ExportStream {
    pub fn new(
        api: Arc<dyn ExportApi>,
        resource: Arc<dyn Resource>,
        session: &SessionConfig,
    ) -> Self {
        Self {
            reader: ExportReader::new(api, resource, session),
        }
    }

    pub fn name(&self) -> &'static str {
        self.reader.resource().name()
    }

    pub fn primary_key(&self) -> Option<Vec<Vec<String>>> {
        self.reader.resource().primary_key()
    }

    pub fn json_schema(&self) -> Value {
        builtin_schema(self.name()).unwrap_or_else(|| json!({"type": "object"}))
    }

    /// Lazily read all records. Each call starts a new export job.
    pub fn read(&self) -> BoxStream<'static, Result<Record>> {
        self.reader.read()
    }

    pub async fn read_all(&self) -> Result<Vec<Record>> {
        self.reader.read_all().await
    }
}

/// CleverTap source connector.
pub struct SourceCleverTap {
    base_url: Option<String>,
}

impl SourceCleverTap {
    /// Use the region-derived CleverTap host.
    pub fn new() -> Self {
        Self { base_url: None }
    }

    /// Send every request to `base_url` instead (for testing).
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            base_url: Some(base_url),
        }
    }

    /// Validate `config` and derive the session.
    pub fn session(&self, config: &SourceConfig, today: NaiveDate) -> Result<SessionConfig> {
        let session = SessionConfig::resolve(config, today)?;
        Ok(match &self.base_url {
            Some(url) => session.with_endpoint(Endpoint::with_base_url(url.clone())),
            None => session,
        })
    }

    /// Streams a resolved session can read, in catalog order.
    ///
    /// Profiles is left out when no `event_name` is configured, so a default
    /// read still extracts events.
    pub fn streams(&self, session: &SessionConfig) -> Result<Vec<ExportStream>> {
        let api = self.client(session)?;
        Ok(get_all_resources()
            .into_iter()
            .filter(|resource| match resource.initiation_payload(&session.window) {
                Ok(_) => true,
                Err(e) => {
                    debug!(stream = resource.name(), reason = %e, "Skipping stream");
                    false
                }
            })
            .map(|resource| ExportStream::new(Arc::clone(&api), resource, session))
            .collect())
    }

    /// One stream by name. Fails before any request when the name is unknown
    /// or the session cannot start that stream's export.
    pub fn stream(&self, session: &SessionConfig, name: &str) -> Result<ExportStream> {
        let resource = find_resource(name).ok_or_else(|| ConfigError::InvalidValue {
            field: "stream",
            reason: format!("unknown stream {}", name),
        })?;
        resource.initiation_payload(&session.window)?;
        Ok(ExportStream::new(self.client(session)?, resource, session))
    }

    /// Validate the config and start one events export to prove the
    /// credentials work. Never returns an error; failures become a `FAILED`
    /// status with a message.
    pub async fn check_connection(
        &self,
        config: &SourceConfig,
        today: NaiveDate,
    ) -> ConnectionStatus {
        match self.try_check(config, today).await {
            Ok(()) => {
                info!("Successfully connected to CleverTap API and obtained cursor");
                ConnectionStatus::succeeded()
            }
            Err(SyncError::Configuration(e)) => ConnectionStatus::failed(e.to_string()),
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Connection check failed");
                ConnectionStatus::failed(format!("Connection check failed: {}", e))
            }
        }
    }

    async fn try_check(&self, config: &SourceConfig, today: NaiveDate) -> Result<()> {
        let session = self.session(config, today)?;
        let api = self.client(&session)?;
        ExportReader::new(api, Arc::new(Events), &session)
            .initiate()
            .await
            .map(|_cursor| ())
    }

    /// Catalog of every stream. Makes no network calls.
    pub fn discover(&self) -> Catalog {
        Catalog {
            streams: get_all_resources()
                .iter()
                .map(|resource| descriptor(resource.as_ref()))
                .collect(),
        }
    }

    fn client(&self, session: &SessionConfig) -> Result<Arc<dyn ExportApi>> {
        let client = CleverTapClient::new(
            session.endpoint.clone(),
            session.credentials.clone(),
            session.poll_method,
        )?;
        Ok(Arc::new(client))
    }
}

impl Default for SourceCleverTap {
    fn default() -> Self {
        Self::new()
    }
}

fn descriptor(resource: &dyn Resource) -> StreamDescriptor {
    StreamDescriptor {
        name: resource.name().to_string(),
        json_schema: builtin_schema(resource.name())
            .unwrap_or_else(|| json!({"type": "object"})),
        supported_sync_modes: vec!["full_refresh".to_string()],
        source_defined_primary_key: resource.primary_key(),
    }
}

/// Connection specification: the config properties this connector accepts.
pub fn connection_specification() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "CleverTap Source Spec",
        "type": "object",
        "required": ["account_id", "passcode", "start_date"],
        "additionalProperties": true,
        "properties": {
            "account_id": {
                "type": "string",
                "title": "Account ID",
                "description": "CleverTap account id, sent as X-CleverTap-Account-Id."
            },
            "passcode": {
                "type": "string",
                "title": "Passcode",
                "airbyte_secret": true,
                "description": "CleverTap passcode, sent as X-CleverTap-Passcode."
            },
            "start_date": {
                "type": "integer",
                "title": "Start date",
                "description": "First day to export, as YYYYMMDD.",
                "examples": [20220101]
            },
            "end_date": {
                "type": "integer",
                "title": "End date",
                "description": "Last day to export, as YYYYMMDD. Defaults to today."
            },
            "region": {
                "type": "string",
                "title": "Region",
                "description": "Region prefix of the API host, e.g. in1, us1, sg1, eu1. Empty uses api.clevertap.com."
            },
            "event_name": {
                "type": "string",
                "title": "Event name",
                "description": "Event filter. Optional for events, required for profiles."
            },
            "batch_size": {
                "type": "integer",
                "minimum": 1,
                "title": "Batch size",
                "description": "Records per page requested from CleverTap."
            },
            "max_retries": {
                "type": "integer",
                "minimum": 1,
                "default": DEFAULT_MAX_RETRIES,
                "description": "Poll attempts per page while an export is still processing."
            },
            "retry_delay_secs": {
                "type": "integer",
                "minimum": 0,
                "default": DEFAULT_RETRY_DELAY_SECS,
                "description": "Fixed wait between processing retries."
            },
            "poll_method": {
                "type": "string",
                "enum": ["post", "get"],
                "default": "post",
                "description": "HTTP verb used to poll an export cursor."
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    fn config() -> SourceConfig {
        serde_json::from_value(json!({
            "account_id": "TEST-ACCOUNT-ID",
            "passcode": "TEST-PASSCODE",
            "region": "in1",
            "event_name": "Test Event",
            "start_date": 20220101,
            "end_date": 20220201
        }))
        .unwrap()
    }

    #[test]
    fn test_streams() {
        let source = SourceCleverTap::new();
        let session = source.session(&config(), today()).unwrap();
        let streams = source.streams(&session).unwrap();

        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].name(), "profiles");
        assert_eq!(streams[1].name(), "events");
        assert_eq!(streams[0].primary_key(), None);
        assert_eq!(streams[1].primary_key().unwrap().len(), 3);
        assert_eq!(streams[1].json_schema()["type"], "object");
        assert_eq!(session.endpoint.base_url(), "https://in1.api.clevertap.com");
    }

    #[test]
    fn test_streams_without_event_name_skip_profiles() {
        let mut raw = config();
        raw.event_name = None;

        let source = SourceCleverTap::new();
        let session = source.session(&raw, today()).unwrap();
        let names: Vec<_> = source
            .streams(&session)
            .unwrap()
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, vec!["events"]);
    }

    #[test]
    fn test_stream_by_name() {
        let source = SourceCleverTap::new();
        let session = source.session(&config(), today()).unwrap();
        assert_eq!(source.stream(&session, "profiles").unwrap().name(), "profiles");

        let err = source.stream(&session, "campaigns").err().unwrap();
        assert!(matches!(
            err,
            SyncError::Configuration(ConfigError::InvalidValue { field: "stream", .. })
        ));

        let mut raw = config();
        raw.event_name = None;
        let session = source.session(&raw, today()).unwrap();
        assert_eq!(source.stream(&session, "events").unwrap().name(), "events");
        let err = source.stream(&session, "profiles").err().unwrap();
        assert!(matches!(
            err,
            SyncError::Configuration(ConfigError::MissingField { field: "event_name" })
        ));
    }

    #[test]
    fn test_session_rejects_invalid_config() {
        let source = SourceCleverTap::new();
        let mut invalid = config();
        invalid.start_date = Some(json!(20220230));

        let err = source.session(&invalid, today()).unwrap_err();
        assert_eq!(err.kind(), "configuration_error");
        assert!(err.to_string().contains("start_date"));
    }

    #[test]
    fn test_base_url_override() {
        let source = SourceCleverTap::with_base_url("http://127.0.0.1:9".to_string());
        let session = source.session(&config(), today()).unwrap();
        assert_eq!(session.endpoint.base_url(), "http://127.0.0.1:9");
    }

    #[test]
    fn test_discover() {
        let catalog = SourceCleverTap::new().discover();
        let names: Vec<_> = catalog.streams.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["profiles", "events"]);
        assert_eq!(catalog.streams[0].source_defined_primary_key, None);
        assert_eq!(
            catalog.streams[1].source_defined_primary_key,
            Some(vec![
                vec!["identity".to_string()],
                vec!["session_id".to_string()],
                vec!["timestamp".to_string()],
            ])
        );
        assert!(catalog
            .streams
            .iter()
            .all(|s| s.supported_sync_modes == vec!["full_refresh"]));
    }

    #[test]
    fn test_connection_specification_required_fields() {
        let spec = connection_specification();
        assert_eq!(spec["required"], json!(["account_id", "passcode", "start_date"]));
        assert_eq!(spec["properties"]["max_retries"]["default"], 10);
    }

    #[tokio::test]
    async fn test_check_connection_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/1/events.json")
            .match_header("X-CleverTap-Account-Id", "TEST-ACCOUNT-ID")
            .match_body(Matcher::Json(json!({
                "from": 20220101,
                "to": 20220201,
                "event_name": "Test Event"
            })))
            .with_status(200)
            .with_body(r#"{"status": "success", "cursor": "test_cursor"}"#)
            .create_async()
            .await;

        let source = SourceCleverTap::with_base_url(server.url());
        let status = source.check_connection(&config(), today()).await;

        mock.assert_async().await;
        assert!(status.is_success(), "{status:?}");
        assert_eq!(status.message, None);
    }

    #[tokio::test]
    async fn test_check_connection_missing_fields() {
        let source = SourceCleverTap::new();
        let incomplete: SourceConfig =
            serde_json::from_value(json!({"account_id": "TEST"})).unwrap();

        let status = source.check_connection(&incomplete, today()).await;
        assert!(!status.is_success());
        assert!(status
            .message
            .unwrap()
            .contains("Missing required config field: passcode"));
    }

    #[tokio::test]
    async fn test_check_connection_invalid_date_range() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/1/events.json")
            .expect(0)
            .create_async()
            .await;

        let mut invalid = config();
        invalid.start_date = Some(json!(20220201));
        invalid.end_date = Some(json!(20220101));

        let source = SourceCleverTap::with_base_url(server.url());
        let status = source.check_connection(&invalid, today()).await;

        mock.assert_async().await;
        assert!(!status.is_success());
        assert!(status
            .message
            .unwrap()
            .contains("start_date must be less than or equal to end_date"));
    }

    #[tokio::test]
    async fn test_check_connection_missing_cursor() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/1/events.json")
            .with_status(200)
            .with_body(r#"{"status": "success"}"#)
            .create_async()
            .await;

        let source = SourceCleverTap::with_base_url(server.url());
        let status = source.check_connection(&config(), today()).await;

        assert!(!status.is_success());
        let message = status.message.unwrap();
        assert!(message.starts_with("Connection check failed"));
        assert!(message.contains("no cursor returned"));
    }

    #[tokio::test]
    async fn test_check_connection_auth_failure() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/1/events.json")
            .with_status(401)
            .with_body(r#"{"status": "fail", "error": "Invalid Account ID or Passcode"}"#)
            .create_async()
            .await;

        let source = SourceCleverTap::with_base_url(server.url());
        let status = source.check_connection(&config(), today()).await;

        assert!(!status.is_success());
        assert!(status.message.unwrap().contains("HTTP 401"));
    }
}
