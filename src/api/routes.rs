use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::api::handlers::{
    capture::{get_capture_status, list_interfaces, start_capture, stop_capture},
    packets::{clear_packets, download_export, get_packet_stats, get_packets, save_export},
};
use crate::api::websocket::ws_index;

/// Root endpoint to provide information about the API
async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "netsniffer API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Live packet capture and traffic statistics",
        "endpoints": [
            {
                "path": "/api/interfaces",
                "method": "GET",
                "description": "List available network interfaces"
            },
            {
                "path": "/api/capture/start",
                "method": "POST",
                "description": "Start packet capture"
            },
            {
                "path": "/api/capture/stop",
                "method": "POST",
                "description": "Stop packet capture"
            },
            {
                "path": "/api/capture/status",
                "method": "GET",
                "description": "Get session state and statistics"
            },
            {
                "path": "/api/packets",
                "method": "GET",
                "description": "Get the most recent packets (?limit=, ?summary=true)"
            },
            {
                "path": "/api/packets/stats",
                "method": "GET",
                "description": "Get packet statistics"
            },
            {
                "path": "/api/packets/clear",
                "method": "POST",
                "description": "Drop retained packets"
            },
            {
                "path": "/api/packets/export",
                "method": "GET",
                "description": "Download packets and statistics as JSON"
            },
            {
                "path": "/api/packets/export",
                "method": "POST",
                "description": "Write packets and statistics to the export directory"
            },
            {
                "path": "/api/ws",
                "method": "GET",
                "description": "WebSocket endpoint for real-time updates"
            }
        ]
    }))
}

/// Configure API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // Root endpoint
        .route("/", web::get().to(index))
        .service(
            web::scope("/api")
                // WebSocket route for real-time updates
                .route("/ws", web::get().to(ws_index))
                .route("/interfaces", web::get().to(list_interfaces))
                // Capture management
                .service(
                    web::scope("/capture")
                        .route("/start", web::post().to(start_capture))
                        .route("/stop", web::post().to(stop_capture))
                        .route("/status", web::get().to(get_capture_status)),
                )
                // Packet data
                .service(
                    web::scope("/packets")
                        .route("", web::get().to(get_packets))
                        .route("/stats", web::get().to(get_packet_stats))
                        .route("/clear", web::post().to(clear_packets))
                        .route("/export", web::get().to(download_export))
                        .route("/export", web::post().to(save_export)),
                ),
        );
}
