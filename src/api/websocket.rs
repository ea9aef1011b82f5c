use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_ws::{Message, Session};
use futures_util::StreamExt;
use log::{debug, info, warn};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::time::interval;
use uuid::Uuid;

use crate::api::ApiState;
use crate::capture::TrafficMonitor;
use crate::models::packet::PacketSummary;
use crate::models::session::{CaptureSession, SessionInfo};
use crate::models::stats::AggregateStats;

/// How often status, stats and new packets are pushed
const UPDATE_INTERVAL: Duration = Duration::from_secs(1);

// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// How long a client may stay silent before the connection is dropped
const CLIENT_TIMEOUT: Duration = Duration::from_secs(15);

/// Cap on packets pushed per update
const MAX_PACKETS_PER_UPDATE: usize = 100;

/// WebSocket message types that can be sent to clients
#[derive(Serialize)]
#[serde(tag = "type")]
enum WsOutMessage {
    #[serde(rename = "stats")]
    Stats { stats: AggregateStats },

    #[serde(rename = "status")]
    Status {
        running: bool,
        state: CaptureSession,
        session: Option<SessionInfo>,
        packet_count: u64,
    },

    #[serde(rename = "packets")]
    Packets { packets: Vec<PacketSummary> },
}

/// Tracks which packets a client has already received
#[derive(Debug, Default)]
struct PacketCursor {
    session: Option<Uuid>,
    last_id: u64,
}

impl PacketCursor {
    /// Packets newer than the cursor; a new session rewinds it
    fn advance(&mut self, monitor: &dyn TrafficMonitor) -> Vec<PacketSummary> {
        let session = monitor.session_info().map(|info| info.id);
        if session != self.session {
            self.session = session;
            self.last_id = 0;
        }

        let mut packets = monitor.packets_since(self.last_id);
        if let Some(last) = packets.last() {
            self.last_id = last.id;
        }
        if packets.len() > MAX_PACKETS_PER_UPDATE {
            packets.drain(..packets.len() - MAX_PACKETS_PER_UPDATE);
        }

        packets.iter().map(|p| p.summary()).collect()
    }
}

/// Handle WebSocket connections
pub async fn ws_index(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<ApiState>,
) -> Result<HttpResponse, Error> {
    let addr = req
        .peer_addr()
        .map(|peer| peer.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    info!("WebSocket connection from: {}", addr);

    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, body)?;
    let monitor = state.monitor.clone();

    actix_web::rt::spawn(async move {
        let mut updates = interval(UPDATE_INTERVAL);
        let mut heartbeat = interval(HEARTBEAT_INTERVAL);
        let mut last_seen = Instant::now();
        let mut cursor = PacketCursor::default();

        loop {
            tokio::select! {
                msg = msg_stream.next() => {
                    let msg = match msg {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => {
                            warn!("WebSocket protocol error from {}: {}", addr, e);
                            break;
                        }
                        None => break,
                    };
                    last_seen = Instant::now();

                    match msg {
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Text(text) => {
                            debug!("Received text message: {}", text);

                            // Process client commands
                            let sent = match text.trim() {
                                "status" => send_status(&mut session, monitor.as_ref()).await,
                                "stats" => send_stats(&mut session, monitor.as_ref()).await,
                                other => {
                                    debug!("Ignoring unknown command: {}", other);
                                    Ok(())
                                }
                            };
                            if sent.is_err() {
                                break;
                            }
                        }
                        Message::Close(reason) => {
                            info!("Client requested close: {:?}", reason);
                            break;
                        }
                        _ => {}
                    }
                }
                _ = updates.tick() => {
                    if send_update(&mut session, monitor.as_ref(), &mut cursor).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if last_seen.elapsed() > CLIENT_TIMEOUT {
                        warn!("WebSocket client {} heartbeat timed out", addr);
                        break;
                    }
                    if session.ping(b"").await.is_err() {
                        break;
                    }
                }
            }
        }

        let _ = session.close(None).await;
        info!("WebSocket connection closed: {}", addr);
    });

    Ok(response)
}

async fn send_json(session: &mut Session, msg: &WsOutMessage) -> Result<(), actix_ws::Closed> {
    match serde_json::to_string(msg) {
        Ok(json) => session.text(json).await,
        Err(e) => {
            warn!("Failed to serialize WebSocket message: {}", e);
            Ok(())
        }
    }
}

/// Send current status to WebSocket client
async fn send_status(session: &mut Session, monitor: &dyn TrafficMonitor) -> Result<(), actix_ws::Closed> {
    let state = monitor.session_state();
    let msg = WsOutMessage::Status {
        running: state == CaptureSession::Running,
        state,
        session: monitor.session_info(),
        packet_count: monitor.stats().total_packets,
    };
    send_json(session, &msg).await
}

/// Send current stats to WebSocket client
async fn send_stats(session: &mut Session, monitor: &dyn TrafficMonitor) -> Result<(), actix_ws::Closed> {
    send_json(session, &WsOutMessage::Stats { stats: monitor.stats() }).await
}

/// Periodic push: status, stats and packets captured since the last push
async fn send_update(
    session: &mut Session,
    monitor: &dyn TrafficMonitor,
    cursor: &mut PacketCursor,
) -> Result<(), actix_ws::Closed> {
    send_status(session, monitor).await?;
    send_stats(session, monitor).await?;

    let packets = cursor.advance(monitor);
    if !packets.is_empty() {
        send_json(session, &WsOutMessage::Packets { packets }).await?;
    }
    Ok(())
}
