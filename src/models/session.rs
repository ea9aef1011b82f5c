use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Run-state of the capture engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum CaptureSession {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed(String),
}

impl CaptureSession {
    /// Whether a new session may be started from this state
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            CaptureSession::Idle | CaptureSession::Stopped | CaptureSession::Failed(_)
        )
    }

    /// Whether a capture loop is (or is about to be) active
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            CaptureSession::Starting | CaptureSession::Running | CaptureSession::Stopping
        )
    }

    /// Failure reason, if the session failed
    pub fn failure(&self) -> Option<&str> {
        match self {
            CaptureSession::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        CaptureSession::Idle
    }
}

/// Descriptive information about the current (or last) session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub interface: String,
    pub filter: String,
    pub started_at: DateTime<Utc>,
    pub state: CaptureSession,
}
