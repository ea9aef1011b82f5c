use actix_web::{web, HttpResponse};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::handlers::blocking_failure;
use crate::api::ApiState;
use crate::models::packet::{PacketRecord, PacketSummary};
use crate::utils::error::CaptureError;

/// Query parameters for listing packets
#[derive(Debug, Deserialize)]
pub struct PacketsQuery {
    /// Return at most this many of the most recent packets
    #[serde(default = "default_limit")]
    limit: usize,

    /// Return list-view summaries instead of full records
    #[serde(default)]
    summary: bool,
}

fn default_limit() -> usize {
    100
}

/// Query parameters for exporting packets; no limit exports the whole buffer
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum PacketList {
    Records(Vec<PacketRecord>),
    Summaries(Vec<PacketSummary>),
}

/// Response for listing packets
#[derive(Serialize)]
struct PacketsResponse {
    packets: PacketList,
    count: usize,
    limit: usize,
}

/// Get the most recent packets
pub async fn get_packets(state: web::Data<ApiState>, query: web::Query<PacketsQuery>) -> HttpResponse {
    let records = state.monitor.recent_packets(Some(query.limit));
    let count = records.len();

    let packets = if query.summary {
        PacketList::Summaries(records.iter().map(PacketRecord::summary).collect())
    } else {
        PacketList::Records(records)
    };

    HttpResponse::Ok().json(PacketsResponse {
        packets,
        count,
        limit: query.limit,
    })
}

/// Get packet statistics
pub async fn get_packet_stats(state: web::Data<ApiState>) -> HttpResponse {
    HttpResponse::Ok().json(state.monitor.stats())
}

/// Drop retained packets; statistics are kept
pub async fn clear_packets(state: web::Data<ApiState>) -> HttpResponse {
    let cleared = state.monitor.clear_packets();
    HttpResponse::Ok().json(json!({
        "status": "success",
        "message": format!("Cleared {} packets", cleared),
        "cleared": cleared,
    }))
}

/// Return the export document as the response body
pub async fn download_export(state: web::Data<ApiState>, query: web::Query<ExportQuery>) -> HttpResponse {
    let document = state.monitor.export_packets(query.limit);
    let file_name = format!("packets_{}.json", document.exported_at.format("%Y%m%d_%H%M%S"));

    HttpResponse::Ok()
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", file_name),
        ))
        .json(document)
}

/// Write the export document into the export directory
pub async fn save_export(
    state: web::Data<ApiState>,
    query: web::Query<ExportQuery>,
) -> Result<HttpResponse, CaptureError> {
    let document = state.monitor.export_packets(query.limit);
    let count = document.packets.len();
    let dir = state.export_dir.clone();

    let path = web::block(move || document.write_to(&dir))
        .await
        .map_err(blocking_failure)??;

    info!("Export saved to {}", path.display());
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": format!("Exported {} packets", count),
        "path": path.display().to_string(),
        "count": count,
    })))
}
