use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One emitted row: a JSON object as returned (and possibly flattened).
pub type Record = Map<String, Value>;

/// Outcome of a connection check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Succeeded,
    Failed,
}

/// Boolean-plus-message result of `check`. Errors are folded into `message`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConnectionStatus {
    pub fn succeeded() -> Self {
        Self {
            status: CheckStatus::Succeeded,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Failed,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CheckStatus::Succeeded
    }
}

/// Stream entry in a discovered catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub name: String,
    pub json_schema: Value,
    pub supported_sync_modes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_defined_primary_key: Option<Vec<Vec<String>>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub streams: Vec<StreamDescriptor>,
}

/// A record wrapped for the harness, stamped with the stream and emit time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordMessage {
    pub stream: String,
    pub data: Record,
    /// Epoch milliseconds.
    pub emitted_at: i64,
}

/// Line-delimited protocol message written to stdout by the CLI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    Spec { spec: Value },
    ConnectionStatus { connection_status: ConnectionStatus },
    Catalog { catalog: Catalog },
    Record { record: RecordMessage },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connection_status_serialization() {
        let ok = Message::ConnectionStatus {
            connection_status: ConnectionStatus::succeeded(),
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"type": "CONNECTION_STATUS", "connection_status": {"status": "SUCCEEDED"}})
        );

        let failed = ConnectionStatus::failed("Missing required config field: passcode");
        assert!(!failed.is_success());
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"status": "FAILED", "message": "Missing required config field: passcode"})
        );
    }

    #[test]
    fn test_record_message_serialization() {
        let mut data = Record::new();
        data.insert("identity".to_string(), json!("u1"));
        let message = Message::Record {
            record: RecordMessage {
                stream: "events".to_string(),
                data,
                emitted_at: 1_700_000_000_000,
            },
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "type": "RECORD",
                "record": {
                    "stream": "events",
                    "data": {"identity": "u1"},
                    "emitted_at": 1_700_000_000_000i64
                }
            })
        );
    }
}
