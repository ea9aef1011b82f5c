use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use crate::models::packet::PacketRecord;
use crate::models::stats::AggregateStats;

/// Per-second packet/byte counts over a fixed trailing window.
///
/// Memory is one bucket per second of window width, regardless of traffic.
#[derive(Debug)]
struct RateWindow {
    origin: Instant,
    width: u64,
    buckets: Vec<RateBucket>,
}

#[derive(Debug, Clone, Copy, Default)]
struct RateBucket {
    second: u64,
    packets: u64,
    bytes: u64,
}

impl RateWindow {
    fn new(width_secs: u64, origin: Instant) -> Self {
        let width = width_secs.max(1);
        Self {
            origin,
            width,
            buckets: vec![RateBucket::default(); width as usize],
        }
    }

    fn record(&mut self, bytes: u64, at: Instant) {
        let second = at.saturating_duration_since(self.origin).as_secs();
        let bucket = &mut self.buckets[(second % self.width) as usize];
        if bucket.second != second || bucket.packets == 0 {
            *bucket = RateBucket {
                second,
                packets: 0,
                bytes: 0,
            };
        }
        bucket.packets += 1;
        bucket.bytes += bytes;
    }

    /// (packets/s, bytes/s) over the window ending at `now`
    fn rates(&self, now: Instant) -> (f64, f64) {
        let elapsed = now.saturating_duration_since(self.origin);
        let current = elapsed.as_secs();

        let (packets, bytes) = self
            .buckets
            .iter()
            .filter(|b| b.packets > 0 && b.second <= current && current - b.second < self.width)
            .fold((0u64, 0u64), |(p, by), b| (p + b.packets, by + b.bytes));

        // Whole buckets before the current one plus the elapsed part of the current second
        let covered = if current + 1 >= self.width {
            let whole = Duration::from_secs(self.width - 1);
            whole + (elapsed - Duration::from_secs(current))
        } else {
            elapsed
        };
        let span = covered.max(Duration::from_secs(1)).as_secs_f64();

        (packets as f64 / span, bytes as f64 / span)
    }
}

/// Bounded heavy-hitter tracking (Space-Saving).
///
/// Holds at most `capacity` keys. When a new key arrives at capacity it
/// replaces the current minimum and inherits its count, so the reported
/// counts are upper bounds for keys that entered late.
#[derive(Debug)]
struct TopCounts<K> {
    capacity: usize,
    counts: HashMap<K, u64>,
    ordered: BTreeSet<(u64, K)>,
}

impl<K: Copy + Ord + Hash> TopCounts<K> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            counts: HashMap::with_capacity(capacity),
            ordered: BTreeSet::new(),
        }
    }

    fn observe(&mut self, key: K) {
        if self.capacity == 0 {
            return;
        }

        let next = match self.counts.get(&key) {
            Some(&count) => {
                self.ordered.remove(&(count, key));
                count + 1
            }
            None if self.counts.len() < self.capacity => 1,
            None => match self.ordered.pop_first() {
                Some((min_count, evicted)) => {
                    self.counts.remove(&evicted);
                    min_count + 1
                }
                None => 1,
            },
        };

        self.counts.insert(key, next);
        self.ordered.insert((next, key));
    }

    fn to_map<T: Eq + Hash>(&self, convert: impl Fn(&K) -> T) -> HashMap<T, u64> {
        self.counts
            .iter()
            .map(|(key, count)| (convert(key), *count))
            .collect()
    }
}

#[derive(Debug)]
struct AggregatorState {
    total_packets: u64,
    total_bytes: u64,
    per_protocol_count: HashMap<String, u64>,
    per_protocol_bytes: HashMap<String, u64>,
    malformed_frames: u64,
    started_at: Option<DateTime<Utc>>,
    rate: RateWindow,
    talkers: TopCounts<IpAddr>,
    ports: TopCounts<u16>,
}

impl AggregatorState {
    fn new(window_secs: u64, top_k: usize, origin: Instant) -> Self {
        Self {
            total_packets: 0,
            total_bytes: 0,
            per_protocol_count: HashMap::new(),
            per_protocol_bytes: HashMap::new(),
            malformed_frames: 0,
            started_at: None,
            rate: RateWindow::new(window_secs, origin),
            talkers: TopCounts::new(top_k),
            ports: TopCounts::new(top_k),
        }
    }
}

/// Running statistics over the records of one capture session
#[derive(Debug)]
pub struct StatsAggregator {
    window_secs: u64,
    top_k: usize,
    state: Mutex<AggregatorState>,
}

impl StatsAggregator {
    pub fn new(window_secs: u64, top_k: usize) -> Self {
        Self {
            window_secs,
            top_k,
            state: Mutex::new(AggregatorState::new(window_secs, top_k, Instant::now())),
        }
    }

    /// Account for one record. Observing the same record twice counts it twice.
    pub fn observe(&self, record: &PacketRecord) {
        self.observe_at(record, Instant::now());
    }

    pub fn observe_at(&self, record: &PacketRecord, at: Instant) {
        let bytes = record.length as u64;
        let mut state = self.state.lock();

        state.total_packets += 1;
        state.total_bytes += bytes;
        *state
            .per_protocol_count
            .entry(record.protocol_label.clone())
            .or_insert(0) += 1;
        *state
            .per_protocol_bytes
            .entry(record.protocol_label.clone())
            .or_insert(0) += bytes;
        state.rate.record(bytes, at);

        if let Some(addr) = record.src_address {
            state.talkers.observe(addr);
        }
        if let Some(port) = record.src_port {
            state.ports.observe(port);
        }
    }

    /// Count a frame that was only partially classified
    pub fn note_malformed(&self) {
        self.state.lock().malformed_frames += 1;
    }

    /// Set the wall-clock start of the session reported in snapshots
    pub fn mark_started(&self, at: DateTime<Utc>) {
        self.state.lock().started_at = Some(at);
    }

    /// Immutable copy of the current statistics
    pub fn snapshot(&self) -> AggregateStats {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> AggregateStats {
        let state = self.state.lock();
        let (packets_per_second, bytes_per_second) = state.rate.rates(now);

        AggregateStats {
            total_packets: state.total_packets,
            total_bytes: state.total_bytes,
            per_protocol_count: state.per_protocol_count.clone(),
            per_protocol_bytes: state.per_protocol_bytes.clone(),
            packets_per_second,
            bytes_per_second,
            top_talkers: state.talkers.to_map(IpAddr::to_string),
            top_ports: state.ports.to_map(|port| *port),
            malformed_frames: state.malformed_frames,
            started_at: state.started_at,
            failure: None,
        }
    }

    /// Zero all counters and restart the rate window now
    pub fn reset(&self) {
        self.reset_at(Instant::now());
    }

    pub fn reset_at(&self, origin: Instant) {
        *self.state.lock() = AggregatorState::new(self.window_secs, self.top_k, origin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::packet::PacketTimestamp;
    use std::net::Ipv4Addr;

    fn with_port(mut record: PacketRecord, port: u16) -> PacketRecord {
        record.src_port = Some(port);
        record
    }

    fn record(label: &str, length: usize, src: Option<[u8; 4]>) -> PacketRecord {
        PacketRecord {
            id: 0,
            timestamp: PacketTimestamp::now(Duration::ZERO),
            interface: "eth0".to_string(),
            length,
            link_layer: None,
            network_layer: None,
            transport_layer: None,
            src_address: src.map(|o| IpAddr::V4(Ipv4Addr::from(o))),
            dst_address: None,
            src_port: None,
            dst_port: None,
            protocol_label: label.to_string(),
            payload_preview: None,
        }
    }

    #[test]
    fn test_totals_match_observed_records() {
        let stats = StatsAggregator::new(5, 10);
        let lengths = [60usize, 1500, 42, 98];
        for length in lengths {
            stats.observe(&record("TCP", length, None));
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_packets, 4);
        assert_eq!(snapshot.total_bytes, lengths.iter().sum::<usize>() as u64);
    }

    #[test]
    fn test_per_protocol_counts_and_double_counting() {
        let stats = StatsAggregator::new(5, 10);
        let dns = record("DNS", 80, None);
        stats.observe(&dns);
        stats.observe(&dns);
        stats.observe(&record("HTTP", 500, None));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.per_protocol_count["DNS"], 2);
        assert_eq!(snapshot.per_protocol_bytes["DNS"], 160);
        assert_eq!(snapshot.per_protocol_count["HTTP"], 1);
        assert_eq!(snapshot.per_protocol_bytes["HTTP"], 500);
    }

    #[test]
    fn test_rate_uses_trailing_window() {
        let origin = Instant::now();
        let stats = StatsAggregator::new(5, 10);
        stats.reset_at(origin);

        // 10 packets in each of the first 10 seconds
        for second in 0..10u64 {
            for i in 0..10u64 {
                let at = origin + Duration::from_secs(second) + Duration::from_millis(i * 50);
                stats.observe_at(&record("UDP", 100, None), at);
            }
        }

        let snapshot = stats.snapshot_at(origin + Duration::from_millis(9_999));
        assert_eq!(snapshot.total_packets, 100);
        assert!((snapshot.packets_per_second - 50.0 / 4.999).abs() < 0.01);
        assert!((snapshot.bytes_per_second - 5000.0 / 4.999).abs() < 1.0);

        // Traffic stopped: the window drains to zero
        let snapshot = stats.snapshot_at(origin + Duration::from_secs(30));
        assert_eq!(snapshot.packets_per_second, 0.0);
        assert_eq!(snapshot.total_packets, 100);
    }

    #[test]
    fn test_top_talkers_bounded() {
        let stats = StatsAggregator::new(5, 2);
        for _ in 0..5 {
            stats.observe(&record("TCP", 60, Some([10, 0, 0, 1])));
        }
        for _ in 0..3 {
            stats.observe(&record("TCP", 60, Some([10, 0, 0, 2])));
        }
        stats.observe(&record("TCP", 60, Some([10, 0, 0, 3])));
        stats.observe(&record("ARP", 42, None));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.top_talkers.len(), 2);
        assert_eq!(snapshot.top_talkers["10.0.0.1"], 5);
        // 10.0.0.3 replaced the minimum and inherited its count
        assert_eq!(snapshot.top_talkers["10.0.0.3"], 4);
        assert_eq!(snapshot.ranked_talkers()[0].0, "10.0.0.1");
    }

    #[test]
    fn test_top_ports_bounded() {
        let stats = StatsAggregator::new(5, 2);
        for _ in 0..4 {
            stats.observe(&with_port(record("DNS", 80, None), 53));
        }
        stats.observe(&with_port(record("HTTP", 400, None), 80));
        stats.observe(&with_port(record("TCP", 60, None), 51000));
        stats.observe(&record("ICMP", 98, Some([10, 0, 0, 1])));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.top_ports.len(), 2);
        assert_eq!(snapshot.top_ports[&53], 4);
        assert_eq!(snapshot.top_ports[&51000], 2);
        assert_eq!(snapshot.ranked_ports()[0], (53, 4));

        // Port keys serialize as JSON object keys
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["top_ports"]["53"], 4);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let stats = StatsAggregator::new(5, 10);
        stats.observe(&with_port(record("TCP", 60, Some([10, 0, 0, 1])), 443));
        stats.note_malformed();
        stats.mark_started(Utc::now());

        stats.reset();
        assert_eq!(stats.snapshot(), AggregateStats::default());
    }
}
