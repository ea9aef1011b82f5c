use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the capture engine to its callers
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Filter expression could not be compiled
    #[error("invalid filter near '{token}': {reason}")]
    InvalidFilter { token: String, reason: String },

    /// Requested interface does not exist
    #[error("interface '{0}' not found")]
    InterfaceNotFound(String),

    /// Capture handle could not be opened because of missing permissions
    #[error("insufficient privileges to capture on '{interface}': {detail}")]
    InsufficientPrivilege { interface: String, detail: String },

    /// A session is already active
    #[error("a capture session is already running")]
    AlreadyRunning,

    /// The capture source failed while the session was running
    #[error("capture source failure: {0}")]
    SourceFailure(String),

    /// Error from I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stable, machine-readable error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidFilter,
    InterfaceNotFound,
    InsufficientPrivilege,
    AlreadyRunning,
    SourceFailure,
    Io,
    Json,
}

impl CaptureError {
    /// Build an invalid filter error for the given token
    pub fn invalid_filter(token: impl Into<String>, reason: impl Into<String>) -> Self {
        CaptureError::InvalidFilter {
            token: token.into(),
            reason: reason.into(),
        }
    }

    /// Get the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::InvalidFilter { .. } => ErrorKind::InvalidFilter,
            CaptureError::InterfaceNotFound(_) => ErrorKind::InterfaceNotFound,
            CaptureError::InsufficientPrivilege { .. } => ErrorKind::InsufficientPrivilege,
            CaptureError::AlreadyRunning => ErrorKind::AlreadyRunning,
            CaptureError::SourceFailure(_) => ErrorKind::SourceFailure,
            CaptureError::Io(_) => ErrorKind::Io,
            CaptureError::Json(_) => ErrorKind::Json,
        }
    }

    /// Remediation hint shown next to the error message
    pub fn remediation(&self) -> &'static str {
        self.kind().remediation()
    }
}

impl ErrorKind {
    /// Remediation hint for this kind of error
    pub fn remediation(self) -> &'static str {
        match self {
            ErrorKind::InvalidFilter => {
                "Check the filter syntax, e.g. 'tcp port 80' or 'udp and not port 53'."
            }
            ErrorKind::InterfaceNotFound => {
                "List the available interfaces and pick one of the reported names."
            }
            ErrorKind::InsufficientPrivilege => {
                "Run with administrator/root privileges (or grant CAP_NET_RAW), or use demo mode."
            }
            ErrorKind::AlreadyRunning => "Stop the current capture before starting a new one.",
            ErrorKind::SourceFailure => {
                "The interface went away or the capture handle closed; check the interface and restart."
            }
            ErrorKind::Io => "Check that the export directory exists and is writable.",
            ErrorKind::Json => "The document could not be serialized; report this as a bug.",
        }
    }
}

/// Per-frame classification problem. Never surfaced to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    /// Not enough bytes for the header of a layer
    #[error("{layer} header truncated: need {needed} bytes, have {available}")]
    Truncated {
        layer: &'static str,
        needed: usize,
        available: usize,
    },

    /// Header present but its fields are inconsistent
    #[error("malformed {layer} header: {detail}")]
    Malformed { layer: &'static str, detail: String },
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_hint_follow_variant() {
        let err = CaptureError::InsufficientPrivilege {
            interface: "eth0".to_string(),
            detail: "Operation not permitted".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::InsufficientPrivilege);
        assert!(err.remediation().contains("demo mode"));

        let err = CaptureError::invalid_filter("(((", "unbalanced parenthesis");
        assert_eq!(err.kind(), ErrorKind::InvalidFilter);
        assert_eq!(err.to_string(), "invalid filter near '(((': unbalanced parenthesis");
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::InterfaceNotFound).unwrap();
        assert_eq!(json, "\"interface_not_found\"");
    }
}
