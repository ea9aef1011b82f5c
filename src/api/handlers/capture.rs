use actix_web::{web, HttpResponse};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::handlers::blocking_failure;
use crate::api::ApiState;
use crate::models::interface::InterfaceInfo;
use crate::models::session::{CaptureSession, SessionInfo};
use crate::models::stats::AggregateStats;
use crate::utils::error::CaptureError;

/// Request for starting capture
#[derive(Debug, Default, Deserialize)]
pub struct StartCaptureRequest {
    /// Interface to capture on
    pub interface: Option<String>,

    /// Filter expression
    pub filter: Option<String>,
}

/// Response for listing interfaces
#[derive(Serialize)]
struct InterfacesResponse {
    /// Plain interface names
    interfaces: Vec<String>,

    /// Detailed interface information
    detailed_interfaces: Vec<InterfaceInfo>,
}

/// Response for capture status
#[derive(Serialize)]
struct CaptureStatusResponse {
    is_running: bool,
    state: CaptureSession,
    session: Option<SessionInfo>,
    demo: bool,
    packet_count: u64,
    stats: AggregateStats,
}

/// List available network interfaces
pub async fn list_interfaces(state: web::Data<ApiState>) -> Result<HttpResponse, CaptureError> {
    let monitor = state.monitor.clone();
    let detailed_interfaces = web::block(move || monitor.list_interfaces())
        .await
        .map_err(blocking_failure)??;

    let interfaces = detailed_interfaces
        .iter()
        .map(|info| info.device_name.clone())
        .collect();

    Ok(HttpResponse::Ok().json(InterfacesResponse {
        interfaces,
        detailed_interfaces,
    }))
}

/// Start packet capture
pub async fn start_capture(
    state: web::Data<ApiState>,
    request: Option<web::Json<StartCaptureRequest>>,
) -> Result<HttpResponse, CaptureError> {
    let request = request.map(web::Json::into_inner).unwrap_or_default();

    let interface = match request.interface.or_else(|| state.default_interface.clone()) {
        Some(interface) => interface,
        None => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "status": "error",
                "message": "No interface specified. Please select an interface first."
            })));
        }
    };
    let filter = request.filter.unwrap_or_default();

    info!("Starting capture with interface: {}, filter: {:?}", interface, filter);

    let monitor = state.monitor.clone();
    let result = web::block(move || monitor.start(&interface, &filter))
        .await
        .map_err(blocking_failure)?;

    match result {
        Ok(session) => {
            info!("Capture started successfully");
            Ok(HttpResponse::Ok().json(json!({
                "status": "success",
                "message": "Capture started successfully",
                "session": session,
            })))
        }
        Err(e) => {
            error!("Failed to start capture: {}", e);
            Err(e)
        }
    }
}

/// Stop packet capture
pub async fn stop_capture(state: web::Data<ApiState>) -> Result<HttpResponse, CaptureError> {
    let monitor = state.monitor.clone();
    web::block(move || monitor.stop())
        .await
        .map_err(blocking_failure)?;

    info!("Capture stopped successfully");
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Capture stopped successfully",
        "state": state.monitor.session_state(),
    })))
}

/// Get capture status
pub async fn get_capture_status(state: web::Data<ApiState>) -> HttpResponse {
    let monitor = &state.monitor;
    let session_state = monitor.session_state();
    let stats = monitor.stats();

    HttpResponse::Ok().json(CaptureStatusResponse {
        is_running: session_state == CaptureSession::Running,
        state: session_state,
        session: monitor.session_info(),
        demo: state.demo,
        packet_count: stats.total_packets,
        stats,
    })
}
