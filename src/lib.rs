//! CleverTap source connector: exports `events` and `profiles` records from
//! the CleverTap API as a stream of JSON objects.
//!
//! # Architecture
//!
//! ```text
//! config.json
//!      ↓
//! ┌─────────────────────────────────────────┐
//! │       SessionConfig::resolve             │
//! │  - Validate required keys and dates      │
//! │  - Derive window, endpoint, retry budget │
//! └─────────────────────────────────────────┘
//!      ↓
//! ┌─────────────────────────────────────────┐
//! │       ExportReader (per resource)        │
//! │  - Initiate export → cursor              │
//! │  - Poll cursor, retry while processing   │
//! │  - Transform and emit page records       │
//! │  - Advance until no cursor remains       │
//! └─────────────────────────────────────────┘
//!      ↓
//!   Stream<Item = Result<Record, SyncError>>
//! ```
//!
//! # Reading a stream
//!
//! ```no_run
//! use futures::StreamExt;
//! use source_clevertap::{SourceCleverTap, SourceConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config: SourceConfig = serde_json::from_str(
//!     r#"{"account_id": "ACCT", "passcode": "PASS", "start_date": 20240101}"#,
//! )?;
//! let today = chrono::Local::now().date_naive();
//!
//! let source = SourceCleverTap::new();
//! let session = source.session(&config, today)?;
//! for stream in source.streams(&session)? {
//!     let mut records = stream.read();
//!     while let Some(record) = records.next().await {
//!         println!("{}: {:?}", stream.name(), record?);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod pagination;
pub mod registry;
pub mod resources;
pub mod schema;
pub mod source;
pub mod transformer;
mod types;

pub use api::{CleverTapClient, ExportApi, ExportResponse};
pub use config::{SessionConfig, SourceConfig, SyncWindow};
pub use error::{ConfigError, SyncError};
pub use pagination::{ExportReader, Page};
pub use resources::{Events, Profiles, Resource};
pub use source::{connection_specification, ExportStream, SourceCleverTap};
pub use types::{
    Catalog, CheckStatus, ConnectionStatus, Message, Record, RecordMessage, StreamDescriptor,
};
