//! JSON-schema descriptors for each stream.
//!
//! Schemas ship with the crate under `schemas/{stream}.json`.

use serde_json::Value;

const PROFILES_SCHEMA: &str = include_str!("../schemas/profiles.json");
const EVENTS_SCHEMA: &str = include_str!("../schemas/events.json");

/// Built-in schema for a stream, or `None` for an unknown stream name.
pub fn builtin_schema(stream: &str) -> Option<Value> {
    let raw = match stream {
        "profiles" => PROFILES_SCHEMA,
        "events" => EVENTS_SCHEMA,
        _ => return None,
    };
    serde_json::from_str(raw).ok()
}
