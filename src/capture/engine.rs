use chrono::Utc;
use log::{debug, error, info, log_enabled, trace, warn, Level};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use uuid::Uuid;

use crate::capture::aggregator::StatsAggregator;
use crate::capture::buffer::RetentionBuffer;
use crate::capture::classifier::{Classification, PacketClassifier, RecordMeta};
use crate::capture::filter::CompiledFilter;
use crate::capture::pcap_source::PcapSource;
use crate::capture::source::{CaptureSource, FramePoll, FrameStream, WakeHandle};
use crate::capture::synthetic::SyntheticSource;
use crate::models::config::{DemoConfig, EngineConfig};
use crate::models::export::ExportDocument;
use crate::models::interface::InterfaceInfo;
use crate::models::packet::{PacketRecord, PacketTimestamp};
use crate::models::session::{CaptureSession, SessionInfo};
use crate::models::stats::AggregateStats;
use crate::utils::error::{CaptureError, CaptureResult};

/// Read/control surface shared by live and simulated capture.
///
/// Every method is safe to call from any thread in any session state.
pub trait TrafficMonitor: Send + Sync {
    /// Interfaces that can be captured on
    fn list_interfaces(&self) -> CaptureResult<Vec<InterfaceInfo>>;

    /// Details of one interface
    fn interface_details(&self, name: &str) -> CaptureResult<InterfaceInfo> {
        self.list_interfaces()?
            .into_iter()
            .find(|info| info.device_name == name)
            .ok_or_else(|| CaptureError::InterfaceNotFound(name.to_string()))
    }

    /// Start a new session on `interface` keeping only packets matching `filter`
    fn start(&self, interface: &str, filter: &str) -> CaptureResult<SessionInfo>;

    /// Stop the current session and wait for the capture loop to exit. Idempotent.
    fn stop(&self);

    /// Statistics of the current (or last) session
    fn stats(&self) -> AggregateStats;

    /// Most recent packets in capture order, optionally limited to the last `limit`
    fn recent_packets(&self, limit: Option<usize>) -> Vec<PacketRecord>;

    /// Retained packets with an id greater than `after_id`
    fn packets_since(&self, after_id: u64) -> Vec<PacketRecord>;

    fn session_state(&self) -> CaptureSession;

    fn session_info(&self) -> Option<SessionInfo>;

    /// Drop retained packets without touching statistics; returns how many were dropped
    fn clear_packets(&self) -> usize;

    /// Snapshot of packets and statistics for export
    fn export_packets(&self, limit: Option<usize>) -> ExportDocument {
        ExportDocument {
            exported_at: Utc::now(),
            session: self.session_info(),
            stats: self.stats(),
            packets: self.recent_packets(limit),
        }
    }
}

/// Session state visible to readers and to the capture loop
#[derive(Debug, Default)]
struct SessionShared {
    state: RwLock<CaptureSession>,
    info: RwLock<Option<SessionInfo>>,
}

impl SessionShared {
    fn set(&self, state: CaptureSession) {
        debug!("Capture session -> {:?}", state);
        *self.state.write() = state;
    }

    /// Transition only out of `from`; returns whether it happened
    fn transition(&self, from: &CaptureSession, to: CaptureSession) -> bool {
        let mut state = self.state.write();
        if *state == *from {
            debug!("Capture session {:?} -> {:?}", *state, to);
            *state = to;
            true
        } else {
            false
        }
    }
}

/// Handle on a running capture loop
struct ActiveCapture {
    stop: Arc<AtomicBool>,
    wake: WakeHandle,
    thread: JoinHandle<()>,
}

/// Everything the capture loop needs, moved into its thread
struct CaptureLoop<T: FrameStream> {
    stream: T,
    interface: String,
    filter: CompiledFilter,
    classifier: Arc<PacketClassifier>,
    buffer: Arc<RetentionBuffer>,
    stats: Arc<StatsAggregator>,
    session: Arc<SessionShared>,
    stop: Arc<AtomicBool>,
    started: Instant,
}

enum LoopExit {
    Requested,
    SourceClosed,
    SourceFailed(String),
}

impl<T: FrameStream> CaptureLoop<T> {
    fn run(mut self) {
        info!("Starting capture loop for interface: {}", self.interface);

        let mut next_id: u64 = 1;
        let exit = loop {
            if self.stop.load(Ordering::SeqCst) {
                break LoopExit::Requested;
            }

            let frame = match self.stream.next_frame() {
                Ok(FramePoll::Frame(frame)) => frame,
                Ok(FramePoll::Idle) => continue,
                // A woken stream may report itself closed
                Ok(FramePoll::Closed) if self.stop.load(Ordering::SeqCst) => {
                    break LoopExit::Requested
                }
                Ok(FramePoll::Closed) => break LoopExit::SourceClosed,
                Err(e) => break LoopExit::SourceFailed(e.to_string()),
            };

            let meta = RecordMeta {
                id: next_id,
                interface: &self.interface,
                timestamp: PacketTimestamp {
                    wall: frame.captured_at,
                    monotonic: self.started.elapsed(),
                },
            };
            let Classification { record, issue } = self.classifier.classify(&frame, meta);

            if !self.filter.matches(&record) {
                if log_enabled!(Level::Trace) {
                    trace!("{} rejected by filter", record.info());
                }
                continue;
            }

            if let Some(issue) = issue {
                debug!("Packet #{} partially classified: {}", record.id, issue);
                self.stats.note_malformed();
            }

            next_id += 1;
            let record = Arc::new(record);
            self.buffer.push(record.clone());
            self.stats.observe(&record);
        };

        match exit {
            LoopExit::Requested => {
                info!("Capture loop stopped for interface: {}", self.interface);
            }
            LoopExit::SourceClosed => {
                info!("Capture source on {} closed", self.interface);
                self.session
                    .transition(&CaptureSession::Running, CaptureSession::Stopped);
            }
            LoopExit::SourceFailed(reason) => {
                error!("Error capturing on {}: {}", self.interface, reason);
                self.session
                    .transition(&CaptureSession::Running, CaptureSession::Failed(reason));
            }
        }
    }
}

/// Orchestrates filter compilation, the capture source, classification,
/// retention and statistics for one session at a time.
pub struct CaptureEngine<S: CaptureSource> {
    source: S,
    classifier: Arc<PacketClassifier>,
    buffer: Arc<RetentionBuffer>,
    stats: Arc<StatsAggregator>,
    session: Arc<SessionShared>,

    /// Serializes start/stop and owns the running loop
    control: Mutex<Option<ActiveCapture>>,
}

/// Engine capturing from real interfaces
pub type LiveEngine = CaptureEngine<PcapSource>;

/// Engine fed by synthetic traffic
pub type DemoEngine = CaptureEngine<SyntheticSource>;

impl LiveEngine {
    pub fn live(config: EngineConfig) -> Self {
        let source = PcapSource::new(&config);
        Self::new(source, config)
    }
}

impl DemoEngine {
    pub fn demo(config: EngineConfig, demo: DemoConfig) -> Self {
        Self::new(SyntheticSource::new(demo), config)
    }
}

impl<S: CaptureSource> CaptureEngine<S> {
    pub fn new(source: S, config: EngineConfig) -> Self {
        Self {
            source,
            classifier: Arc::new(PacketClassifier::new(config.label_policy.clone())),
            buffer: Arc::new(RetentionBuffer::new(config.buffer_capacity)),
            stats: Arc::new(StatsAggregator::new(config.rate_window_secs, config.top_talkers)),
            session: Arc::new(SessionShared::default()),
            control: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Reap a loop that ended on its own (source closed or failed)
    fn reap_finished(&self, control: &mut Option<ActiveCapture>) {
        if let Some(active) = control.take() {
            active.stop.store(true, Ordering::SeqCst);
            active.wake.wake();
            if active.thread.join().is_err() {
                error!("Capture thread panicked");
            }
        }
    }

    fn refresh_info_state(&self) {
        let state = self.session.state.read().clone();
        if let Some(info) = self.session.info.write().as_mut() {
            info.state = state;
        }
    }
}

impl<S: CaptureSource> TrafficMonitor for CaptureEngine<S> {
    fn list_interfaces(&self) -> CaptureResult<Vec<InterfaceInfo>> {
        self.source.list_interfaces()
    }

    fn start(&self, interface: &str, filter: &str) -> CaptureResult<SessionInfo> {
        let mut control = self.control.lock();

        if !self.session.state.read().can_start() {
            warn!("Capture is already running");
            return Err(CaptureError::AlreadyRunning);
        }
        self.reap_finished(&mut control);

        let compiled = CompiledFilter::compile(filter)?;

        info!("Starting capture on interface: {}", interface);
        self.session.set(CaptureSession::Starting);

        // A new session begins here, whether or not the source opens
        self.buffer.clear();
        self.stats.reset();
        let started_at = Utc::now();
        let mut info = SessionInfo {
            id: Uuid::new_v4(),
            interface: interface.to_string(),
            filter: compiled.expression().to_string(),
            started_at,
            state: CaptureSession::Starting,
        };
        *self.session.info.write() = Some(info.clone());

        let stream = match self.source.open(interface, &compiled) {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to open capture on {}: {}", interface, e);
                let failed = CaptureSession::Failed(e.to_string());
                info.state = failed.clone();
                *self.session.info.write() = Some(info);
                self.session.set(failed);
                return Err(e);
            }
        };

        self.stats.mark_started(started_at);
        info.state = CaptureSession::Running;
        *self.session.info.write() = Some(info.clone());

        let stop = Arc::new(AtomicBool::new(false));
        let wake = stream.wake_handle();
        let capture_loop = CaptureLoop {
            stream,
            interface: interface.to_string(),
            filter: compiled,
            classifier: self.classifier.clone(),
            buffer: self.buffer.clone(),
            stats: self.stats.clone(),
            session: self.session.clone(),
            stop: stop.clone(),
            started: Instant::now(),
        };

        self.session.set(CaptureSession::Running);
        let spawned = thread::Builder::new()
            .name(format!("capture-{}", interface))
            .spawn(move || capture_loop.run());

        match spawned {
            Ok(thread) => {
                *control = Some(ActiveCapture { stop, wake, thread });
                info!("Capture session {} running on {}", info.id, interface);
                Ok(info)
            }
            Err(e) => {
                let reason = format!("failed to spawn capture thread: {}", e);
                error!("{}", reason);
                self.session.set(CaptureSession::Failed(reason.clone()));
                self.refresh_info_state();
                Err(CaptureError::SourceFailure(reason))
            }
        }
    }

    fn stop(&self) {
        let mut control = self.control.lock();

        let active = match control.take() {
            Some(active) => active,
            None => {
                debug!("Stop requested with no active capture");
                return;
            }
        };

        info!("Stopping packet capture");
        self.session
            .transition(&CaptureSession::Running, CaptureSession::Stopping);

        active.stop.store(true, Ordering::SeqCst);
        active.wake.wake();

        if active.thread.join().is_err() {
            error!("Capture thread panicked");
            self.session
                .set(CaptureSession::Failed("capture thread panicked".to_string()));
        } else {
            self.session
                .transition(&CaptureSession::Stopping, CaptureSession::Stopped);
        }
        self.refresh_info_state();

        info!("Capture stopped ({} packets retained)", self.buffer.len());
    }

    fn stats(&self) -> AggregateStats {
        let mut stats = self.stats.snapshot();
        stats.failure = self.session.state.read().failure().map(str::to_string);
        stats
    }

    fn recent_packets(&self, limit: Option<usize>) -> Vec<PacketRecord> {
        self.buffer.snapshot(limit)
    }

    fn packets_since(&self, after_id: u64) -> Vec<PacketRecord> {
        self.buffer.since(after_id)
    }

    fn session_state(&self) -> CaptureSession {
        self.session.state.read().clone()
    }

    fn session_info(&self) -> Option<SessionInfo> {
        let state = self.session_state();
        self.session.info.read().clone().map(|mut info| {
            info.state = state;
            info
        })
    }

    fn clear_packets(&self) -> usize {
        let cleared = self.buffer.clear();
        info!("Cleared {} retained packets", cleared);
        cleared
    }
}

impl<S: CaptureSource> Drop for CaptureEngine<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
