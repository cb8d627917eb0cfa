//! Error types for hide-core operations.
//!
//! `AlreadyExists` / `NotFound` are not errors here: they are reported through
//! [`AddOutcome`](crate::AddOutcome) and [`RemoveOutcome`](crate::RemoveOutcome).

/// All errors that can occur in hide-core operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HideError {
    // ─────────────────────────────────────────────────────────────────────
    // Request Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid package or process name: {package}/{process}")]
    InvalidName { package: String, process: String },

    // ─────────────────────────────────────────────────────────────────────
    // Collaborator Errors
    // ─────────────────────────────────────────────────────────────────────
    /// Persistence failed. For add/remove the in-memory state has already
    /// changed and is not rolled back.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("The kernel does not support mount namespaces")]
    NamespaceUnsupported,

    #[error("Daemon error: {0}")]
    Daemon(String),
}

/// Convenience type alias for Results using HideError.
pub type Result<T> = std::result::Result<T, HideError>;

impl From<HideError> for String {
    fn from(err: HideError) -> String {
        err.to_string()
    }
}
