use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use netsniffer::capture::filter::CompiledFilter;
use netsniffer::capture::frames;
use netsniffer::capture::source::{CaptureSource, FramePoll, FrameStream, RawFrame, WakeHandle};
use netsniffer::models::config::EngineConfig;
use netsniffer::models::export::ExportDocument;
use netsniffer::models::interface::InterfaceInfo;
use netsniffer::models::session::CaptureSession;
use netsniffer::{CaptureEngine, CaptureError, CaptureResult, TrafficMonitor};

const CLIENT: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 20);
const SERVER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);

#[derive(Debug, Clone)]
enum Step {
    Frame(Vec<u8>),
    Fail(&'static str),
    Close,
}

/// Source replaying a fixed script, then blocking until woken
struct ScriptedSource {
    script: Mutex<Vec<Step>>,
    opens: AtomicUsize,

    /// Report the stream closed once woken, as libpcap does after a breakloop
    close_on_wake: AtomicBool,
}

impl ScriptedSource {
    fn with_script(steps: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(steps),
            opens: AtomicUsize::new(0),
            close_on_wake: AtomicBool::new(false),
        }
    }
}

#[derive(Default)]
struct Signal {
    woken: Mutex<bool>,
    cond: Condvar,
}

struct ScriptedStream {
    steps: VecDeque<Step>,
    signal: Arc<Signal>,
    close_on_wake: bool,
}

impl CaptureSource for ScriptedSource {
    type Stream = ScriptedStream;

    fn list_interfaces(&self) -> CaptureResult<Vec<InterfaceInfo>> {
        Ok(vec![InterfaceInfo::new("test0"), InterfaceInfo::new("denied0")])
    }

    fn open(&self, interface: &str, _filter: &CompiledFilter) -> CaptureResult<ScriptedStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match interface {
            "test0" => Ok(ScriptedStream {
                steps: self.script.lock().clone().into(),
                signal: Arc::new(Signal::default()),
                close_on_wake: self.close_on_wake.load(Ordering::SeqCst),
            }),
            "denied0" => Err(CaptureError::InsufficientPrivilege {
                interface: interface.to_string(),
                detail: "Operation not permitted".to_string(),
            }),
            other => Err(CaptureError::InterfaceNotFound(other.to_string())),
        }
    }
}

impl FrameStream for ScriptedStream {
    fn next_frame(&mut self) -> CaptureResult<FramePoll> {
        match self.steps.pop_front() {
            Some(Step::Frame(data)) => Ok(FramePoll::Frame(RawFrame::ethernet(data))),
            Some(Step::Fail(reason)) => Err(CaptureError::SourceFailure(reason.to_string())),
            Some(Step::Close) => Ok(FramePoll::Closed),
            None => {
                // Blocks like an idle link until stop() wakes us
                let mut woken = self.signal.woken.lock();
                while !*woken {
                    self.signal.cond.wait(&mut woken);
                }
                *woken = false;
                if self.close_on_wake {
                    Ok(FramePoll::Closed)
                } else {
                    Ok(FramePoll::Idle)
                }
            }
        }
    }

    fn wake_handle(&self) -> WakeHandle {
        let signal = self.signal.clone();
        WakeHandle::new(move || {
            *signal.woken.lock() = true;
            signal.cond.notify_all();
        })
    }
}

fn engine(steps: Vec<Step>) -> CaptureEngine<ScriptedSource> {
    engine_with(steps, EngineConfig::default())
}

fn engine_with(steps: Vec<Step>, config: EngineConfig) -> CaptureEngine<ScriptedSource> {
    CaptureEngine::new(ScriptedSource::with_script(steps), config)
}

fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn http_frame() -> Vec<u8> {
    frames::tcp_frame(CLIENT, 51000, SERVER, 80, frames::TCP_SYN, b"")
}

fn dns_frame() -> Vec<u8> {
    frames::udp_frame(CLIENT, 40000, SERVER, 53, b"query")
}

#[test]
fn test_http_and_dns_frames_end_to_end() {
    let engine = engine(vec![Step::Frame(http_frame()), Step::Frame(dns_frame())]);
    engine.start("test0", "").unwrap();
    assert!(wait_until(|| engine.stats().total_packets == 2));
    engine.stop();

    let stats = engine.stats();
    let expected: HashMap<String, u64> = [("HTTP".to_string(), 1), ("DNS".to_string(), 1)]
        .into_iter()
        .collect();
    assert_eq!(stats.per_protocol_count, expected);
    assert_eq!(
        stats.total_bytes,
        (http_frame().len() + dns_frame().len()) as u64
    );
    assert_eq!(stats.top_talkers.get("192.168.1.20"), Some(&2));
    assert_eq!(stats.ranked_ports(), vec![(40000, 1), (51000, 1)]);

    let packets = engine.recent_packets(None);
    let labels: Vec<&str> = packets.iter().map(|p| p.protocol_label.as_str()).collect();
    assert_eq!(labels, vec!["HTTP", "DNS"]);
    assert_eq!(packets[0].id, 1);
    assert_eq!(packets[1].id, 2);
    assert_eq!(packets[0].interface, "test0");
    assert!(packets[0].timestamp.monotonic <= packets[1].timestamp.monotonic);
}

#[test]
fn test_second_start_fails_and_keeps_first_session() {
    let engine = engine(vec![Step::Frame(http_frame()), Step::Frame(dns_frame())]);
    let first = engine.start("test0", "").unwrap();
    assert!(wait_until(|| engine.stats().total_packets == 2));

    let err = engine.start("test0", "udp").unwrap_err();
    assert!(matches!(err, CaptureError::AlreadyRunning));

    assert_eq!(engine.session_state(), CaptureSession::Running);
    assert_eq!(engine.session_info().map(|s| s.id), Some(first.id));
    assert_eq!(engine.stats().total_packets, 2);
    assert_eq!(engine.recent_packets(None).len(), 2);
    engine.stop();
}

#[test]
fn test_invalid_filter_never_opens_source() {
    let engine = engine(vec![]);
    let err = engine.start("test0", "not a filter (((").unwrap_err();

    match err {
        CaptureError::InvalidFilter { token, .. } => assert_eq!(token, "a"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(engine.session_state(), CaptureSession::Idle);
    assert_eq!(engine.source().opens.load(Ordering::SeqCst), 0);
}

#[test]
fn test_stop_while_blocked_returns_promptly() {
    let engine = engine(vec![]);
    engine.start("test0", "tcp port 80").unwrap();
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    engine.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(engine.session_state(), CaptureSession::Stopped);

    // Idempotent
    engine.stop();
    assert_eq!(engine.session_state(), CaptureSession::Stopped);
}

#[test]
fn test_stop_through_interrupted_pull() {
    let engine = engine(vec![Step::Frame(dns_frame())]);
    engine.source().close_on_wake.store(true, Ordering::SeqCst);
    engine.start("test0", "").unwrap();
    assert!(wait_until(|| engine.stats().total_packets == 1));

    let started = Instant::now();
    engine.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(engine.session_state(), CaptureSession::Stopped);
    assert_eq!(engine.stats().failure, None);
}

#[test]
fn test_source_failure_marks_session_failed() {
    let engine = engine(vec![Step::Frame(http_frame()), Step::Fail("interface went away")]);
    engine.start("test0", "").unwrap();
    assert!(wait_until(|| matches!(engine.session_state(), CaptureSession::Failed(_))));

    let stats = engine.stats();
    assert_eq!(stats.total_packets, 1);
    assert!(stats.failure.unwrap().contains("interface went away"));

    // stop() keeps the failure, and a new session may start
    engine.stop();
    assert!(matches!(engine.session_state(), CaptureSession::Failed(_)));
    engine.source().script.lock().clear();
    engine.start("test0", "").unwrap();
    assert_eq!(engine.session_state(), CaptureSession::Running);
    assert_eq!(engine.stats().failure, None);
    engine.stop();
}

#[test]
fn test_source_close_stops_session() {
    let engine = engine(vec![Step::Frame(dns_frame()), Step::Close]);
    engine.start("test0", "").unwrap();
    assert!(wait_until(|| engine.session_state() == CaptureSession::Stopped));
    assert_eq!(engine.stats().total_packets, 1);
}

#[test]
fn test_open_errors_are_reported() {
    let engine = engine(vec![]);

    let err = engine.start("denied0", "").unwrap_err();
    assert!(matches!(err, CaptureError::InsufficientPrivilege { .. }));
    assert!(err.remediation().contains("demo mode"));
    assert!(matches!(engine.session_state(), CaptureSession::Failed(_)));

    let err = engine.start("missing0", "").unwrap_err();
    assert!(matches!(err, CaptureError::InterfaceNotFound(_)));
}

#[test]
fn test_failed_open_does_not_rewrite_previous_session() {
    let engine = engine(vec![Step::Frame(http_frame())]);
    let first = engine.start("test0", "tcp").unwrap();
    assert!(wait_until(|| engine.stats().total_packets == 1));
    engine.stop();

    let err = engine.start("missing0", "udp").unwrap_err();
    assert!(matches!(err, CaptureError::InterfaceNotFound(_)));

    let info = engine.session_info().unwrap();
    assert_ne!(info.id, first.id);
    assert_eq!(info.interface, "missing0");
    assert_eq!(info.filter, "udp");
    assert!(matches!(info.state, CaptureSession::Failed(_)));

    // Counters belong to the failed attempt, not the earlier session
    let stats = engine.stats();
    assert_eq!(stats.total_packets, 0);
    assert!(stats.failure.unwrap().contains("missing0"));
    assert!(engine.recent_packets(None).is_empty());
}

#[test]
fn test_buffer_keeps_most_recent_records() {
    let steps = (0..8)
        .map(|i| Step::Frame(frames::udp_frame(CLIENT, 40000 + i, SERVER, 53, b"")))
        .collect();
    let config = EngineConfig {
        buffer_capacity: 5,
        ..EngineConfig::default()
    };
    let engine = engine_with(steps, config);
    engine.start("test0", "").unwrap();
    assert!(wait_until(|| engine.stats().total_packets == 8));
    engine.stop();

    let ids: Vec<u64> = engine.recent_packets(None).iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![4, 5, 6, 7, 8]);
    let ids: Vec<u64> = engine.recent_packets(Some(2)).iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![7, 8]);
    assert_eq!(engine.stats().total_packets, 8);
}

#[test]
fn test_filter_drops_non_matching_records() {
    let engine = engine(vec![
        Step::Frame(http_frame()),
        Step::Frame(dns_frame()),
        Step::Frame(frames::icmp_echo_frame(CLIENT, SERVER, 1)),
    ]);
    engine.start("test0", "udp or icmp").unwrap();
    assert!(wait_until(|| engine.stats().total_packets == 2));
    engine.stop();

    let labels: Vec<String> = engine
        .recent_packets(None)
        .into_iter()
        .map(|p| p.protocol_label)
        .collect();
    assert_eq!(labels, vec!["DNS", "ICMP"]);
    assert_eq!(engine.session_info().unwrap().filter, "udp or icmp");
}

#[test]
fn test_garbage_frames_are_counted_not_fatal() {
    let engine = engine(vec![
        Step::Frame(vec![0xde, 0xad]),
        Step::Frame(http_frame()),
    ]);
    engine.start("test0", "").unwrap();
    assert!(wait_until(|| engine.stats().total_packets == 2));

    let stats = engine.stats();
    assert_eq!(stats.per_protocol_count.get("OTHER"), Some(&1));
    assert_eq!(stats.malformed_frames, 1);
    assert_eq!(engine.session_state(), CaptureSession::Running);
    engine.stop();
}

#[test]
fn test_export_round_trip() {
    let engine = engine(vec![Step::Frame(http_frame()), Step::Frame(dns_frame())]);
    engine.start("test0", "").unwrap();
    assert!(wait_until(|| engine.stats().total_packets == 2));
    engine.stop();

    let document = engine.export_packets(None);
    assert_eq!(document.packets, engine.recent_packets(None));
    assert_eq!(document.stats.total_packets, 2);

    let dir = tempfile::tempdir().unwrap();
    let path = document.write_to(dir.path()).unwrap();
    assert!(path.file_name().unwrap().to_string_lossy().starts_with("packets_"));

    let text = std::fs::read_to_string(&path).unwrap();
    let restored = ExportDocument::from_json(&text).unwrap();
    assert_eq!(restored, document);

    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert!(json["packets"][0]["protocol_label"].is_string());
    assert!(json["stats"]["per_protocol_count"]["DNS"].is_u64());
}

#[test]
fn test_interface_details() {
    let engine = engine(vec![]);
    assert_eq!(engine.interface_details("test0").unwrap().device_name, "test0");
    assert!(matches!(
        engine.interface_details("nope"),
        Err(CaptureError::InterfaceNotFound(_))
    ));
}
