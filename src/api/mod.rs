pub mod handlers;
pub mod routes;
pub mod websocket;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use crate::capture::TrafficMonitor;
use crate::utils::error::{CaptureError, ErrorKind};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ApiState {
    pub monitor: Arc<dyn TrafficMonitor>,

    /// Directory export documents are written to
    pub export_dir: PathBuf,

    /// Interface used when a start request names none
    pub default_interface: Option<String>,

    /// Whether the monitor is fed by synthetic traffic
    pub demo: bool,
}

impl ApiState {
    pub fn new(monitor: Arc<dyn TrafficMonitor>, export_dir: PathBuf) -> Self {
        Self {
            monitor,
            export_dir,
            default_interface: None,
            demo: false,
        }
    }
}

impl ResponseError for CaptureError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InvalidFilter => StatusCode::BAD_REQUEST,
            ErrorKind::InterfaceNotFound => StatusCode::NOT_FOUND,
            ErrorKind::InsufficientPrivilege => StatusCode::FORBIDDEN,
            ErrorKind::AlreadyRunning => StatusCode::CONFLICT,
            ErrorKind::SourceFailure | ErrorKind::Io | ErrorKind::Json => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "status": "error",
            "kind": self.kind(),
            "message": self.to_string(),
            "hint": self.remediation(),
        }))
    }
}
