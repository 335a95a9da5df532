//! Validation of stored check records.
//!
//! Records come out of the store as untyped JSON. A record is only handed to
//! the probe executor once every required field checks out; `state` and
//! `lastChecked` are optional and fall back to their defaults.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{
    CHECK_ID_LENGTH, Check, CheckState, HttpMethod, MAX_TIMEOUT_SECONDS, MIN_TIMEOUT_SECONDS,
    OWNER_ID_LENGTH, Protocol,
};

/// A single field of a check record that failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CheckValidationError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("id must be a string of exactly 20 characters")]
    InvalidId,

    #[error("ownerId must be a string of exactly 10 characters")]
    InvalidOwnerId,

    #[error("protocol must be one of: http, https")]
    InvalidProtocol,

    #[error("url must be a non-empty string")]
    InvalidUrl,

    #[error("method must be one of: get, post, put, delete")]
    InvalidMethod,

    #[error("successCodes must be a non-empty array of status codes")]
    InvalidSuccessCodes,

    #[error("timeoutSeconds must be an integer between 1 and 5")]
    InvalidTimeout,
}

impl CheckValidationError {
    /// Name of the record field this error refers to
    pub fn field(&self) -> &'static str {
        match self {
            CheckValidationError::NotAnObject => "record",
            CheckValidationError::InvalidId => "id",
            CheckValidationError::InvalidOwnerId => "ownerId",
            CheckValidationError::InvalidProtocol => "protocol",
            CheckValidationError::InvalidUrl => "url",
            CheckValidationError::InvalidMethod => "method",
            CheckValidationError::InvalidSuccessCodes => "successCodes",
            CheckValidationError::InvalidTimeout => "timeoutSeconds",
        }
    }
}

const KNOWN_FIELDS: &[&str] = &[
    "id",
    "ownerId",
    "protocol",
    "url",
    "method",
    "successCodes",
    "timeoutSeconds",
    "state",
    "lastChecked",
];

/// Validate a raw check record
///
/// Every field is checked, so the error list names all broken fields of the
/// record rather than just the first one.
pub fn validate_check(record: &Value) -> Result<Check, Vec<CheckValidationError>> {
    let Some(fields) = record.as_object() else {
        return Err(vec![CheckValidationError::NotAnObject]);
    };

    let mut errors = Vec::new();

    let id = require(validate_id(fields.get("id")), CheckValidationError::InvalidId, &mut errors);
    let owner_id = require(
        validate_owner_id(fields.get("ownerId")),
        CheckValidationError::InvalidOwnerId,
        &mut errors,
    );
    let protocol = require(
        validate_protocol(fields.get("protocol")),
        CheckValidationError::InvalidProtocol,
        &mut errors,
    );
    let url = require(validate_url(fields.get("url")), CheckValidationError::InvalidUrl, &mut errors);
    let method = require(
        validate_method(fields.get("method")),
        CheckValidationError::InvalidMethod,
        &mut errors,
    );
    let success_codes = require(
        validate_success_codes(fields.get("successCodes")),
        CheckValidationError::InvalidSuccessCodes,
        &mut errors,
    );
    let timeout_seconds = require(
        validate_timeout(fields.get("timeoutSeconds")),
        CheckValidationError::InvalidTimeout,
        &mut errors,
    );

    match (id, owner_id, protocol, url, method, success_codes, timeout_seconds) {
        (
            Some(id),
            Some(owner_id),
            Some(protocol),
            Some(url),
            Some(method),
            Some(success_codes),
            Some(timeout_seconds),
        ) => Ok(Check {
            id,
            owner_id,
            protocol,
            url,
            method,
            success_codes,
            timeout_seconds,
            state: parse_state(fields.get("state")),
            last_checked: parse_last_checked(fields.get("lastChecked")),
            extra: unknown_fields(fields),
        }),
        _ => Err(errors),
    }
}

fn require<T>(
    value: Option<T>,
    error: CheckValidationError,
    errors: &mut Vec<CheckValidationError>,
) -> Option<T> {
    if value.is_none() {
        errors.push(error);
    }
    value
}

fn validate_id(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|id| id.chars().count() == CHECK_ID_LENGTH)
        .map(str::to_owned)
}

fn validate_owner_id(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|owner| owner.chars().count() == OWNER_ID_LENGTH)
        .map(str::to_owned)
}

fn validate_protocol(value: Option<&Value>) -> Option<Protocol> {
    value.and_then(Value::as_str).and_then(|p| p.parse().ok())
}

fn validate_url(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|url| !url.trim().is_empty())
        .map(str::to_owned)
}

fn validate_method(value: Option<&Value>) -> Option<HttpMethod> {
    value.and_then(Value::as_str).and_then(|m| m.parse().ok())
}

fn validate_success_codes(value: Option<&Value>) -> Option<Vec<u16>> {
    let codes = value?.as_array()?;
    if codes.is_empty() {
        return None;
    }

    codes
        .iter()
        .map(|code| as_integer(code).and_then(|c| u16::try_from(c).ok()))
        .collect()
}

fn validate_timeout(value: Option<&Value>) -> Option<u64> {
    value
        .and_then(as_integer)
        .and_then(|t| u64::try_from(t).ok())
        .filter(|t| (MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(t))
}

fn parse_state(value: Option<&Value>) -> CheckState {
    match value.and_then(Value::as_str) {
        Some("up") => CheckState::Up,
        _ => CheckState::Down,
    }
}

fn parse_last_checked(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(as_integer)
        .filter(|ms| *ms > 0)
        .and_then(DateTime::from_timestamp_millis)
}

/// Whole numbers only; `3.0` counts, `3.5` does not
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
        .map(|f| f as i64)
}

fn unknown_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
