use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Length of a check identifier
pub const CHECK_ID_LENGTH: usize = 20;

/// Length of an owner identifier (a 10 digit phone number)
pub const OWNER_ID_LENGTH: usize = 10;

/// Allowed range for `timeoutSeconds`
pub const MIN_TIMEOUT_SECONDS: u64 = 1;
pub const MAX_TIMEOUT_SECONDS: u64 = 5;

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a fresh random check identifier
pub fn generate_check_id() -> String {
    let mut rng = rand::thread_rng();
    (0..CHECK_ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Protocol used to reach a check's endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            _ => Err(()),
        }
    }
}

/// HTTP method used for the probe request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl FromStr for HttpMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "delete" => Ok(HttpMethod::Delete),
            _ => Err(()),
        }
    }
}

/// Health state of a check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Up,
    #[default]
    Down,
}

impl CheckState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckState::Up => "up",
            CheckState::Down => "down",
        }
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated check record
///
/// Fields the monitor does not know about are kept in `extra` so that writing
/// the record back does not drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub id: String,
    pub owner_id: String,
    pub protocol: Protocol,
    /// Host and path, without the scheme
    pub url: String,
    pub method: HttpMethod,
    pub success_codes: Vec<u16>,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub state: CheckState,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Check {
    /// Create a new check that has never been evaluated
    pub fn new(
        owner_id: impl Into<String>,
        protocol: Protocol,
        url: impl Into<String>,
        method: HttpMethod,
        success_codes: Vec<u16>,
        timeout_seconds: u64,
    ) -> Self {
        Self {
            id: generate_check_id(),
            owner_id: owner_id.into(),
            protocol,
            url: url.into(),
            method,
            success_codes,
            timeout_seconds,
            state: CheckState::Down,
            last_checked: None,
            extra: Map::new(),
        }
    }

    /// Full target URL, e.g. `https://example.com/health`
    pub fn target(&self) -> String {
        format!("{}://{}", self.protocol, self.url)
    }

    /// Serialize into the stored record representation
    pub fn to_record(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Result of a single probe attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutcome {
    pub failed: bool,
    pub response_code: Option<u16>,
    /// Why the probe failed, if it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeOutcome {
    /// The endpoint answered with `status_code`
    pub fn response(status_code: u16) -> Self {
        Self { failed: false, response_code: Some(status_code), error: None }
    }

    /// The request failed before a response arrived
    pub fn transport_error(reason: impl Into<String>) -> Self {
        Self { failed: true, response_code: None, error: Some(reason.into()) }
    }

    /// No response arrived within the check's timeout
    pub fn timed_out() -> Self {
        Self::transport_error("timeout")
    }
}

/// One line of a check's audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationLogEntry {
    /// The check as it was before this evaluation
    pub check: Check,
    pub outcome: ProbeOutcome,
    /// State after this evaluation
    pub state: CheckState,
    pub alert_sent: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
}
