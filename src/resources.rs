//! Resource descriptors.
//!
//! The pagination engine is shared; a [`Resource`] supplies the parts that
//! differ between CleverTap export endpoints: the path, the initiation
//! payload and the per-record transform.

use crate::config::SyncWindow;
use crate::error::ConfigError;
use crate::transformer::flatten_event;
use crate::types::Record;
use serde_json::{json, Value};

/// A CleverTap export resource.
pub trait Resource: Send + Sync {
    /// Stream name. Also the endpoint path segment unless [`Resource::path`]
    /// is overridden.
    fn name(&self) -> &'static str;

    /// `{base}/1/{path}.json`
    fn path(&self) -> &'static str {
        self.name()
    }

    fn primary_key(&self) -> Option<Vec<Vec<String>>>;

    /// Body of the export-initiation call.
    fn initiation_payload(&self, window: &SyncWindow) -> Result<Value, ConfigError>;

    /// Shape a raw page entry into the emitted record.
    fn transform(&self, record: Record) -> Record {
        record
    }
}

/// User profiles. Records are emitted as returned.
pub struct Profiles;

impl Resource for Profiles {
    fn name(&self) -> &'static str {
        "profiles"
    }

    fn primary_key(&self) -> Option<Vec<Vec<String>>> {
        None
    }

    /// CleverTap selects profiles by the events they performed, so the
    /// profiles export cannot run without an `event_name`.
    fn initiation_payload(&self, window: &SyncWindow) -> Result<Value, ConfigError> {
        let event_name = window
            .event_name
            .as_deref()
            .ok_or(ConfigError::MissingField { field: "event_name" })?;
        Ok(json!({
            "event_name": event_name,
            "from": window.start_date,
            "to": window.end_date,
        }))
    }
}

/// Raw events, flattened with the performing profile's identity fields.
pub struct Events;

impl Resource for Events {
    fn name(&self) -> &'static str {
        "events"
    }

    fn primary_key(&self) -> Option<Vec<Vec<String>>> {
        Some(
            ["identity", "session_id", "timestamp"]
                .iter()
                .map(|k| vec![k.to_string()])
                .collect(),
        )
    }

    fn initiation_payload(&self, window: &SyncWindow) -> Result<Value, ConfigError> {
        let mut payload = json!({
            "from": window.start_date,
            "to": window.end_date,
        });
        if let Some(event_name) = &window.event_name {
            payload["event_name"] = json!(event_name);
        }
        Ok(payload)
    }

    fn transform(&self, record: Record) -> Record {
        flatten_event(record)
    }
}
