//! Synthetic traffic for demo mode.
//!
//! Generates well-formed frames with a plausible protocol mix at a
//! configurable rate. Frames go through the same classifier, filter and
//! statistics path as live traffic, so consumers see the same surface.

use log::{debug, info};
use parking_lot::{Condvar, Mutex};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::capture::filter::CompiledFilter;
use crate::capture::frames;
use crate::capture::source::{CaptureSource, FramePoll, FrameStream, RawFrame, WakeHandle};
use crate::models::config::DemoConfig;
use crate::models::interface::InterfaceInfo;
use crate::utils::error::{CaptureError, CaptureResult};

/// Interface names offered in demo mode
pub const DEMO_INTERFACES: [&str; 4] = ["Demo Interface", "Ethernet", "Wi-Fi", "Loopback"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrafficKind {
    Http,
    Https,
    Dns,
    Tcp,
    Udp,
    Icmp,
    Arp,
}

/// Relative frequency of each kind of generated frame
const TRAFFIC_MIX: [(TrafficKind, u32); 7] = [
    (TrafficKind::Http, 20),
    (TrafficKind::Https, 25),
    (TrafficKind::Dns, 15),
    (TrafficKind::Tcp, 15),
    (TrafficKind::Udp, 10),
    (TrafficKind::Icmp, 8),
    (TrafficKind::Arp, 7),
];

/// Capture source producing synthetic frames instead of touching the network
#[derive(Debug, Clone, Default)]
pub struct SyntheticSource {
    config: DemoConfig,
}

impl SyntheticSource {
    pub fn new(config: DemoConfig) -> Self {
        Self { config }
    }
}

impl CaptureSource for SyntheticSource {
    type Stream = SyntheticStream;

    fn list_interfaces(&self) -> CaptureResult<Vec<InterfaceInfo>> {
        Ok(DEMO_INTERFACES
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let loopback = *name == "Loopback";
                let ipv4 = if loopback {
                    "127.0.0.1".to_string()
                } else {
                    format!("192.168.1.{}", 100 + index)
                };

                let mut info = InterfaceInfo::new(*name)
                    .with_description(Some(format!("Simulated {} adapter", name)))
                    .with_ipv4(Some(ipv4))
                    .with_mac(Some(format!("00:1a:2b:3c:4d:{:02x}", 0x10 + index)));
                info.is_loopback = loopback;
                info
            })
            .collect())
    }

    fn open(&self, interface: &str, _filter: &CompiledFilter) -> CaptureResult<SyntheticStream> {
        if !DEMO_INTERFACES.contains(&interface) {
            return Err(CaptureError::InterfaceNotFound(interface.to_string()));
        }

        info!(
            "Starting synthetic traffic on {} at ~{} packets/s",
            interface, self.config.packets_per_second
        );
        SyntheticStream::new(&self.config)
    }
}

/// Longest gap between generated packets, reached at the minimum rate
const MAX_INTERVAL: Duration = Duration::from_secs(1500);

#[derive(Debug, Default)]
struct WakeSignal {
    woken: Mutex<bool>,
    cond: Condvar,
}

/// Stream of generated frames paced by a randomized inter-arrival time
pub struct SyntheticStream {
    rng: StdRng,
    mix: WeightedIndex<u32>,
    mean_interval: f64,
    next_due: Instant,
    signal: Arc<WakeSignal>,
}

impl SyntheticStream {
    fn new(config: &DemoConfig) -> CaptureResult<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mix = WeightedIndex::new(TRAFFIC_MIX.iter().map(|(_, weight)| *weight))
            .map_err(|e| CaptureError::SourceFailure(format!("invalid traffic mix: {}", e)))?;
        let rate = if config.packets_per_second.is_finite() {
            config.packets_per_second.max(DemoConfig::MIN_RATE)
        } else {
            DemoConfig::default().packets_per_second
        };

        let mut stream = Self {
            rng,
            mix,
            mean_interval: 1.0 / rate,
            next_due: Instant::now(),
            signal: Arc::new(WakeSignal::default()),
        };
        stream.schedule_next();
        Ok(stream)
    }

    /// Pick the next arrival uniformly within +/-50% of the mean interval
    fn schedule_next(&mut self) {
        let secs = self
            .rng
            .gen_range(self.mean_interval * 0.5..=self.mean_interval * 1.5);
        let interval = Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_INTERVAL)
            .min(MAX_INTERVAL);
        self.next_due = Instant::now() + interval;
    }

    fn generate(&mut self) -> Vec<u8> {
        let kind = TRAFFIC_MIX[self.mix.sample(&mut self.rng)].0;
        let client = Ipv4Addr::new(192, 168, 1, self.rng.gen_range(1..=254));
        let server = Ipv4Addr::new(10, 0, 0, self.rng.gen_range(1..=254));
        let ephemeral = self.rng.gen_range(49152..=65535);

        match kind {
            TrafficKind::Http => {
                let padding = self.padding(0..=1200);
                let mut payload = b"GET / HTTP/1.1\r\nHost: demo.local\r\n\r\n".to_vec();
                payload.extend_from_slice(&padding);
                frames::tcp_frame(client, ephemeral, server, 80, frames::TCP_PSH | frames::TCP_ACK, &payload)
            }
            TrafficKind::Https => {
                let payload = self.padding(0..=1400);
                frames::tcp_frame(client, ephemeral, server, 443, frames::TCP_PSH | frames::TCP_ACK, &payload)
            }
            TrafficKind::Dns => {
                let payload = self.padding(12..=120);
                frames::udp_frame(client, ephemeral, server, 53, &payload)
            }
            TrafficKind::Tcp => {
                let flags = [frames::TCP_SYN, frames::TCP_ACK, frames::TCP_FIN, frames::TCP_RST]
                    [self.rng.gen_range(0..4)];
                let port = self.rng.gen_range(49152..=65535);
                frames::tcp_frame(client, ephemeral, server, port, flags, &[])
            }
            TrafficKind::Udp => {
                let payload = self.padding(0..=512);
                let port = self.rng.gen_range(49152..=65535);
                frames::udp_frame(client, ephemeral, server, port, &payload)
            }
            TrafficKind::Icmp => frames::icmp_echo_frame(client, server, self.rng.gen()),
            TrafficKind::Arp => {
                let mac = frames::mac(client.octets()[3]);
                frames::arp_request_frame(mac, client, Ipv4Addr::new(192, 168, 1, 1))
            }
        }
    }

    fn padding(&mut self, len: std::ops::RangeInclusive<usize>) -> Vec<u8> {
        let len = self.rng.gen_range(len);
        (0..len).map(|_| self.rng.gen()).collect()
    }
}

impl FrameStream for SyntheticStream {
    fn next_frame(&mut self) -> CaptureResult<FramePoll> {
        {
            let mut woken = self.signal.woken.lock();
            while !*woken {
                if self.signal.cond.wait_until(&mut woken, self.next_due).timed_out() {
                    break;
                }
            }
            if *woken {
                *woken = false;
                debug!("Synthetic stream woken");
                return Ok(FramePoll::Idle);
            }
        }

        let frame = RawFrame::ethernet(self.generate());
        self.schedule_next();
        Ok(FramePoll::Frame(frame))
    }

    fn wake_handle(&self) -> WakeHandle {
        let signal = self.signal.clone();
        WakeHandle::new(move || {
            *signal.woken.lock() = true;
            signal.cond.notify_all();
        })
    }
}
