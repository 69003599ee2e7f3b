//! Reshaping of raw export records before they are emitted.

use crate::types::Record;
use serde_json::{Map, Value};

/// Event property carrying the CleverTap session id.
pub const SESSION_ID_PROPERTY: &str = "CT Session Id";

/// `(key inside profile, top-level column)` pairs promoted by [`flatten_event`].
pub const PROFILE_COLUMNS: [(&str, &str); 7] = [
    ("identity", "identity"),
    ("name", "name"),
    ("email", "email"),
    ("phone", "phone"),
    ("objectId", "object_id"),
    ("all_identities", "all_identities"),
    ("profileData", "profile_data"),
];

/// Flatten a raw event into the events-stream row shape.
///
/// Promotes the nested `profile` fields to top-level columns, derives
/// `session_id` from `event_props["CT Session Id"]`, then drops `profile`.
/// Columns with no source value are `null` so every row has the same shape.
/// `timestamp` is filled from `ts` when the API did not send one.
pub fn flatten_event(mut record: Record) -> Record {
    let profile = match record.remove("profile") {
        Some(Value::Object(profile)) => profile,
        _ => Map::new(),
    };

    for (source, column) in PROFILE_COLUMNS {
        match profile.get(source) {
            Some(value) => {
                record.insert(column.to_string(), value.clone());
            }
            None => {
                record.entry(column).or_insert(Value::Null);
            }
        }
    }

    let session_id = record
        .get("event_props")
        .and_then(|props| props.get(SESSION_ID_PROPERTY))
        .cloned()
        .unwrap_or(Value::Null);
    record.insert("session_id".to_string(), session_id);

    if !record.contains_key("timestamp") {
        let ts = record.get("ts").cloned().unwrap_or(Value::Null);
        record.insert("timestamp".to_string(), ts);
    }

    record
}
