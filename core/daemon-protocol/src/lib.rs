//! IPC protocol types and validation for hide-daemon.
//!
//! This crate is shared by the daemon and its clients to prevent schema drift.
//! One request per connection: a single JSON line in, a single JSON line out.
//! The daemon remains the authority on name validation; clients only get the
//! shape checks here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 64 * 1024; // 64KB

/// Separator between package and process in a hide list record.
pub const RECORD_SEPARATOR: char = '|';

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    Status,
    Enable,
    Disable,
    Add,
    Remove,
    List,
    Query,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(method: Method, id: Option<String>, params: Option<Value>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            method,
            id,
            params,
        }
    }
}

/// Outcome code carried by every response.
///
/// Numeric codes are stable; clients may use them as exit statuses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HideStatus {
    DaemonError,
    Success,
    ItemExists,
    ItemNotFound,
    NamespaceUnsupported,
    InvalidName,
}

impl HideStatus {
    pub fn code(self) -> i32 {
        match self {
            HideStatus::DaemonError => -1,
            HideStatus::Success => 0,
            HideStatus::ItemExists => 5,
            HideStatus::ItemNotFound => 6,
            HideStatus::NamespaceUnsupported => 7,
            HideStatus::InvalidName => 8,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    pub status: HideStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            status: HideStatus::Success,
            id,
            data: Some(data),
            error: None,
        }
    }

    /// A response that carries only a status code.
    pub fn status(id: Option<String>, status: HideStatus) -> Self {
        Self {
            ok: status == HideStatus::Success,
            status,
            id,
            data: None,
            error: None,
        }
    }

    pub fn error(
        id: Option<String>,
        status: HideStatus,
        code: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::error_with_info(id, status, ErrorInfo::new(code, message))
    }

    pub fn error_with_info(id: Option<String>, status: HideStatus, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            status,
            id,
            data: None,
            error: Some(error),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Method Parameters
// ═══════════════════════════════════════════════════════════════════════════════

/// Params of `add` and `remove`. An empty process means "the package itself"
/// for `add` and "every process" for `remove`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EntryParams {
    pub package: String,
    #[serde(default)]
    pub process: String,
}

#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EnableParams {
    #[serde(default)]
    pub late_props: bool,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct QueryParams {
    pub uid: u32,
    pub process: String,
    #[serde(default)]
    pub max_len: Option<usize>,
}

pub fn parse_entry_params(params: Option<Value>) -> Result<EntryParams, ErrorInfo> {
    let params = params.ok_or_else(|| ErrorInfo::new("invalid_params", "package is required"))?;
    let entry: EntryParams = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new("invalid_params", format!("entry params are invalid: {}", err))
    })?;
    require_string(&entry.package, "package")?;
    reject_separator(&entry.package, "package")?;
    reject_separator(&entry.process, "process")?;
    Ok(entry)
}

pub fn parse_enable_params(params: Option<Value>) -> Result<EnableParams, ErrorInfo> {
    match params {
        None | Some(Value::Null) => Ok(EnableParams::default()),
        Some(params) => serde_json::from_value(params).map_err(|err| {
            ErrorInfo::new(
                "invalid_params",
                format!("enable params are invalid: {}", err),
            )
        }),
    }
}

pub fn parse_query_params(params: Option<Value>) -> Result<QueryParams, ErrorInfo> {
    let params =
        params.ok_or_else(|| ErrorInfo::new("invalid_params", "uid and process are required"))?;
    let query: QueryParams = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new("invalid_params", format!("query params are invalid: {}", err))
    })?;
    require_string(&query.process, "process")?;
    Ok(query)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Hide List Records
// ═══════════════════════════════════════════════════════════════════════════════

pub fn format_record(package: &str, process: &str) -> String {
    format!("{}{}{}", package, RECORD_SEPARATOR, process)
}

pub fn parse_record(record: &str) -> Option<(&str, &str)> {
    record
        .split_once(RECORD_SEPARATOR)
        .filter(|(package, _)| !package.is_empty())
}

fn require_string(value: &str, field: &str) -> Result<(), ErrorInfo> {
    if value.trim().is_empty() {
        return Err(ErrorInfo::new(
            "missing_field",
            format!("{} is required", field),
        ));
    }
    Ok(())
}

fn reject_separator(value: &str, field: &str) -> Result<(), ErrorInfo> {
    if value.contains(RECORD_SEPARATOR) {
        return Err(ErrorInfo::new(
            "invalid_params",
            format!("{} must not contain '{}'", field, RECORD_SEPARATOR),
        ));
    }
    Ok(())
}
