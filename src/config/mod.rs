//! Connector configuration and the session configurator.
//!
//! [`SourceConfig`] is the raw mapping as it arrives from `config.json` (or a
//! TOML file). [`SessionConfig::resolve`] validates it against an injected
//! "today" and derives everything a read needs: the [`SyncWindow`], the
//! [`Endpoint`], the [`RetryPolicy`] and the poll verb. Resolution is pure and
//! performs no I/O.

use crate::error::ConfigError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::time::Duration;


pub const DEFAULT_HOST: &str = "api.clevertap.com";
pub const DEFAULT_MAX_RETRIES: u32 = 10;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

/// Required keys, checked in this order.
const REQUIRED_FIELDS: [&str; 3] = ["account_id", "passcode", "start_date"];

/// Raw connector configuration.
///
/// Every field is optional at this level so that a missing key is reported
/// as [`ConfigError::MissingField`] naming the key, not as a serde error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub passcode: Option<String>,
    /// YYYYMMDD integer. Kept as a raw value so type errors name the field.
    #[serde(default)]
    pub start_date: Option<Value>,
    #[serde(default)]
    pub end_date: Option<Value>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
    /// Batch-size hint passed to the export initiation call.
    #[serde(default)]
    pub batch_size: Option<u32>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default)]
    pub poll_method: PollMethod,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            passcode: None,
            start_date: None,
            end_date: None,
            region: None,
            event_name: None,
            batch_size: None,
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            poll_method: PollMethod::default(),
        }
    }
}

impl SourceConfig {
    fn has_field(&self, field: &str) -> bool {
        match field {
            "account_id" => self.account_id.is_some(),
            "passcode" => self.passcode.is_some(),
            "start_date" => self.start_date.is_some(),
            _ => false,
        }
    }
}

/// HTTP verb used for cursor polls.
///
/// CleverTap deployments have been observed accepting the cursor either in a
/// POST body or as a GET query parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollMethod {
    #[default]
    Post,
    Get,
}

/// Date range (inclusive, YYYYMMDD) and optional event filter for an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncWindow {
    pub start_date: u32,
    pub end_date: u32,
    pub event_name: Option<String>,
}

/// Resolved CleverTap API base address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
}

impl Endpoint {
    /// `https://{region}.api.clevertap.com`, or the unscoped host when the
    /// region is absent or empty.
    pub fn for_region(region: Option<&str>) -> Self {
        let base_url = match region {
            Some(r) if !r.is_empty() => format!("https://{}.{}", r, DEFAULT_HOST),
            _ => format!("https://{}", DEFAULT_HOST),
        };
        Self { base_url }
    }

    /// Use an explicit base address (mock servers, proxies).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/1/{resource}.json`
    pub fn resource_url(&self, resource: &str) -> String {
        format!("{}/1/{}.json", self.base_url, resource)
    }
}

/// Fixed-delay retry budget for "still processing" poll responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total poll attempts per cursor, including the first.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

/// Account credentials sent as `X-CleverTap-*` headers.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    pub account_id: String,
    pub passcode: String,
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("account_id", &self.account_id)
            .field("passcode", &"<redacted>")
            .finish()
    }
}

/// Everything a stream read needs, derived from a [`SourceConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub credentials: AccountCredentials,
    pub window: SyncWindow,
    pub endpoint: Endpoint,
    pub retry: RetryPolicy,
    pub poll_method: PollMethod,
    pub batch_size: Option<u32>,
}

impl SessionConfig {
    /// Validate `raw` and derive the session.
    ///
    /// `today` supplies the default `end_date`; the configurator never reads
    /// the clock itself.
    pub fn resolve(raw: &SourceConfig, today: NaiveDate) -> Result<Self, ConfigError> {
        if let Some(field) = REQUIRED_FIELDS.iter().copied().find(|f| !raw.has_field(f)) {
            return Err(ConfigError::MissingField { field });
        }

        let start_date = match &raw.start_date {
            Some(v) => parse_yyyymmdd("start_date", v)?,
            None => return Err(ConfigError::MissingField { field: "start_date" }),
        };
        let end_date = match &raw.end_date {
            Some(v) if !v.is_null() => parse_yyyymmdd("end_date", v)?,
            _ => date_to_yyyymmdd(today),
        };
        if start_date > end_date {
            return Err(ConfigError::InvalidWindow {
                start: start_date,
                end: end_date,
            });
        }

        if raw.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_retries",
                reason: "must be at least 1".to_string(),
            });
        }
        if raw.batch_size == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "batch_size",
                reason: "must be greater than 0".to_string(),
            });
        }

        let credentials = AccountCredentials {
            account_id: raw.account_id.clone().unwrap_or_default(),
            passcode: raw.passcode.clone().unwrap_or_default(),
        };

        Ok(Self {
            credentials,
            window: SyncWindow {
                start_date,
                end_date,
                event_name: raw.event_name.clone().filter(|n| !n.is_empty()),
            },
            endpoint: Endpoint::for_region(raw.region.as_deref()),
            retry: RetryPolicy {
                max_retries: raw.max_retries,
                retry_delay: Duration::from_secs(raw.retry_delay_secs),
            },
            poll_method: raw.poll_method,
            batch_size: raw.batch_size,
        })
    }

    /// Point the session at a different base address.
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }
}

/// Encode a calendar date as a YYYYMMDD integer.
pub fn date_to_yyyymmdd(date: NaiveDate) -> u32 {
    date.year() as u32 * 10_000 + date.month() * 100 + date.day()
}

/// Parse a JSON integer that must form a valid YYYYMMDD calendar date.
fn parse_yyyymmdd(field: &'static str, value: &Value) -> Result<u32, ConfigError> {
    let invalid = || ConfigError::InvalidDate {
        field,
        value: value.to_string(),
    };

    let n = value.as_u64().ok_or_else(invalid)?;
    if !(10_000_101..=99_991_231).contains(&n) {
        return Err(invalid());
    }
    let n = n as u32;
    let (year, month, day) = ((n / 10_000) as i32, (n / 100) % 100, n % 100);
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
    Ok(n)
}

/// Load a raw config file. `.toml` files are parsed as TOML, everything else
/// as JSON.
pub fn load_config(path: &Path) -> Result<SourceConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
    } else {
        serde_json::from_str(&contents)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
    }
}
