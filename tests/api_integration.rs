use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use netsniffer::api::{routes, ApiState};
use netsniffer::models::config::{DemoConfig, EngineConfig};
use netsniffer::{DemoEngine, TrafficMonitor};

fn demo_state(export_dir: &Path) -> ApiState {
    let engine = DemoEngine::demo(
        EngineConfig::default(),
        DemoConfig {
            packets_per_second: 200.0,
            seed: Some(3),
        },
    );
    let mut state = ApiState::new(Arc::new(engine), export_dir.to_path_buf());
    state.default_interface = Some("Demo Interface".to_string());
    state.demo = true;
    state
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(routes::configure),
        )
        .await
    };
}

#[actix_rt::test]
async fn test_index_lists_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(demo_state(dir.path()));

    let req = test::TestRequest::get().uri("/").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["name"], "netsniffer API");
    assert!(body["endpoints"].as_array().unwrap().len() >= 9);
}

#[actix_rt::test]
async fn test_list_interfaces() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(demo_state(dir.path()));

    let req = test::TestRequest::get().uri("/api/interfaces").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    let names = body["interfaces"].as_array().unwrap();
    assert!(names.contains(&json!("Demo Interface")));
    assert_eq!(
        body["detailed_interfaces"].as_array().unwrap().len(),
        names.len()
    );
}

#[actix_rt::test]
async fn test_start_errors_map_to_status_codes() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(demo_state(dir.path()));

    let req = test::TestRequest::post()
        .uri("/api/capture/start")
        .set_json(json!({ "interface": "Demo Interface", "filter": "tcp port" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "invalid_filter");
    assert!(body["hint"].as_str().unwrap().contains("filter"));

    let req = test::TestRequest::post()
        .uri("/api/capture/start")
        .set_json(json!({ "interface": "eth99" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "interface_not_found");
}

#[actix_rt::test]
async fn test_capture_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let state = demo_state(dir.path());
    let monitor = state.monitor.clone();
    let app = app!(state);

    // No body: falls back to the default interface
    let req = test::TestRequest::post().uri("/api/capture/start").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["session"]["interface"], "Demo Interface");

    let req = test::TestRequest::post()
        .uri("/api/capture/start")
        .set_json(json!({ "interface": "Ethernet" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "already_running");

    let req = test::TestRequest::get().uri("/api/capture/status").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["is_running"], true);
    assert_eq!(body["demo"], true);
    assert_eq!(body["state"]["state"], "running");

    for _ in 0..200 {
        if monitor.stats().total_packets >= 3 {
            break;
        }
        actix_rt::time::sleep(Duration::from_millis(25)).await;
    }

    let req = test::TestRequest::post().uri("/api/capture/stop").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["state"]["state"], "stopped");

    let req = test::TestRequest::get().uri("/api/capture/status").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["is_running"], false);
    assert!(body["packet_count"].as_u64().unwrap() >= 3);
}

#[actix_rt::test]
async fn test_packets_stats_clear_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let state = demo_state(dir.path());
    let monitor = state.monitor.clone();
    let app = app!(state);

    monitor.start("Demo Interface", "").unwrap();
    for _ in 0..200 {
        if monitor.stats().total_packets >= 5 {
            break;
        }
        actix_rt::time::sleep(Duration::from_millis(25)).await;
    }
    monitor.stop();
    let total = monitor.stats().total_packets;
    assert!(total >= 5);

    let req = test::TestRequest::get().uri("/api/packets?limit=2").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["count"], 2);
    assert!(body["packets"][0]["protocol_label"].is_string());

    let req = test::TestRequest::get()
        .uri("/api/packets?limit=3&summary=true")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["count"], 3);
    assert!(body["packets"][0]["protocol"].is_string());

    let req = test::TestRequest::get().uri("/api/packets/stats").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total_packets"], total);
    assert!(!body["top_ports"].as_object().unwrap().is_empty());

    let req = test::TestRequest::post().uri("/api/packets/export").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let path = body["path"].as_str().unwrap().to_string();
    assert!(Path::new(&path).starts_with(dir.path()));
    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved["stats"]["total_packets"], total);

    let req = test::TestRequest::get().uri("/api/packets/export?limit=1").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp
        .headers()
        .get("Content-Disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("packets_"));
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["packets"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::post().uri("/api/packets/clear").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "success");

    let req = test::TestRequest::get().uri("/api/packets").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["count"], 0);

    // Clearing keeps statistics
    assert_eq!(monitor.stats().total_packets, total);
}
