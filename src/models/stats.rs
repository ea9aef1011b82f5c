use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Running statistics for the current capture session
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AggregateStats {
    /// Total number of packets observed this session
    pub total_packets: u64,

    /// Total wire bytes observed this session
    pub total_bytes: u64,

    /// Packets per protocol label
    pub per_protocol_count: HashMap<String, u64>,

    /// Bytes per protocol label
    pub per_protocol_bytes: HashMap<String, u64>,

    /// Packet rate over the trailing window
    pub packets_per_second: f64,

    /// Data rate over the trailing window
    pub bytes_per_second: f64,

    /// Packets per source address, bounded to the configured top-K
    pub top_talkers: HashMap<String, u64>,

    /// Packets per source port, bounded to the same top-K
    #[serde(default)]
    pub top_ports: HashMap<u16, u64>,

    /// Frames that could only be partially classified
    pub malformed_frames: u64,

    /// Session start time
    pub started_at: Option<DateTime<Utc>>,

    /// Reason the session failed, if it did
    pub failure: Option<String>,
}

impl AggregateStats {
    /// Top talkers ordered by packet count, highest first
    pub fn ranked_talkers(&self) -> Vec<(String, u64)> {
        let mut talkers: Vec<(String, u64)> = self
            .top_talkers
            .iter()
            .map(|(addr, count)| (addr.clone(), *count))
            .collect();
        talkers.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        talkers
    }

    /// Source ports ordered by packet count, highest first
    pub fn ranked_ports(&self) -> Vec<(u16, u64)> {
        let mut ports: Vec<(u16, u64)> = self.top_ports.iter().map(|(p, c)| (*p, *c)).collect();
        ports.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ports
    }

    /// Protocol labels ordered by packet count, highest first
    pub fn ranked_protocols(&self) -> Vec<(String, u64)> {
        let mut protocols: Vec<(String, u64)> = self
            .per_protocol_count
            .iter()
            .map(|(label, count)| (label.clone(), *count))
            .collect();
        protocols.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        protocols
    }
}
