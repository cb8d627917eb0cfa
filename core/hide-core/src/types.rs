//! Shared value types and platform constants.

use std::fmt;

/// Sentinel package standing for "any isolated process".
pub const ISOLATED_MAGIC: &str = "isolated";

/// Never matched and never killed: the WebView zygote is shared system-wide.
pub const WEBVIEW_ZYGOTE: &str = "webview_zygote";

/// Per-user UID offset; `uid % PER_USER_RANGE` yields the app ID.
pub const PER_USER_RANGE: u32 = 100_000;

/// First app ID of the isolated-process range.
pub const ISOLATED_APP_ID_START: i32 = 90_000;

/// Index bucket for hidden packages whose owner could not be resolved.
pub const UNRESOLVED_APP_ID: i32 = -1;

/// Truncation length used when callers do not know the kernel buffer size.
pub const DEFAULT_MAX_LEN: usize = 1024;

/// Strips the per-user offset from a UID.
pub fn to_app_id(uid: u32) -> i32 {
    (uid % PER_USER_RANGE) as i32
}

pub fn is_isolated_app_id(app_id: i32) -> bool {
    app_id >= ISOLATED_APP_ID_START
}

/// A configured hide target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HideEntry {
    pub package: String,
    pub process: String,
}

impl HideEntry {
    pub fn new(package: impl Into<String>, process: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            process: process.into(),
        }
    }
}

impl fmt::Display for HideEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.package, self.process)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}
