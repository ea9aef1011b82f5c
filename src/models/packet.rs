use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Capture-time instant of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketTimestamp {
    /// Wall-clock time reported by the capture source
    pub wall: DateTime<Utc>,

    /// Monotonic offset from the start of the capture session
    pub monotonic: Duration,
}

impl PacketTimestamp {
    /// Timestamp for "now" at the given offset into the session
    pub fn now(monotonic: Duration) -> Self {
        Self {
            wall: Utc::now(),
            monotonic,
        }
    }
}

/// Link layer of a frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkLayer {
    Ethernet {
        src_mac: String,
        dst_mac: String,
        ethertype: u16,
        vlan: Option<u16>,
    },
    /// No link header, the frame starts with the IP header
    RawIp,
    Unknown,
}

/// Network layer of a frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NetworkLayer {
    Ipv4 { ttl: u8, protocol: u8 },
    Ipv6 { hop_limit: u8, next_header: u8 },
    Arp { operation: u16, sender_mac: String, target_mac: String },
    Unknown { ethertype: u16 },
}

/// Transport layer of a frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportLayer {
    Tcp { flags: u16, sequence: u32, acknowledgement: u32, window: u16 },
    Udp { length: u16 },
    Icmp { icmp_type: u8, icmp_code: u8, v6: bool },
    Unknown { protocol: u8 },
}

impl NetworkLayer {
    /// Label used when no higher layer claims the packet
    pub fn label(&self) -> Option<&'static str> {
        match self {
            NetworkLayer::Ipv4 { .. } => Some("IPv4"),
            NetworkLayer::Ipv6 { .. } => Some("IPv6"),
            NetworkLayer::Arp { .. } => Some("ARP"),
            NetworkLayer::Unknown { .. } => None,
        }
    }
}

impl TransportLayer {
    /// Label of the transport protocol, if recognized
    pub fn label(&self) -> Option<&'static str> {
        match self {
            TransportLayer::Tcp { .. } => Some("TCP"),
            TransportLayer::Udp { .. } => Some("UDP"),
            TransportLayer::Icmp { v6: false, .. } => Some("ICMP"),
            TransportLayer::Icmp { v6: true, .. } => Some("ICMPv6"),
            TransportLayer::Unknown { .. } => None,
        }
    }

    /// Whether the layer carries ports
    pub fn has_ports(&self) -> bool {
        matches!(self, TransportLayer::Tcp { .. } | TransportLayer::Udp { .. })
    }

    /// Names of the TCP flags that are set
    pub fn tcp_flag_names(&self) -> Vec<&'static str> {
        const NAMES: [(u16, &str); 9] = [
            (0x100, "NS"),
            (0x80, "CWR"),
            (0x40, "ECE"),
            (0x20, "URG"),
            (0x10, "ACK"),
            (0x8, "PSH"),
            (0x4, "RST"),
            (0x2, "SYN"),
            (0x1, "FIN"),
        ];

        match self {
            TransportLayer::Tcp { flags, .. } => NAMES
                .iter()
                .filter(|(bit, _)| flags & bit != 0)
                .map(|(_, name)| *name)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// One classified packet. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRecord {
    /// Sequence number within the capture session
    pub id: u64,

    /// Capture-time instant
    pub timestamp: PacketTimestamp,

    /// Interface the packet was captured on
    pub interface: String,

    /// Wire length in bytes
    pub length: usize,

    pub link_layer: Option<LinkLayer>,
    pub network_layer: Option<NetworkLayer>,
    pub transport_layer: Option<TransportLayer>,

    pub src_address: Option<IpAddr>,
    pub dst_address: Option<IpAddr>,

    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,

    /// Classification used for statistics grouping, "OTHER" when nothing matched
    pub protocol_label: String,

    /// Hex of the first TCP/UDP payload bytes, if there was any payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_preview: Option<String>,
}

/// A more concise representation of a packet for list views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketSummary {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub protocol: String,

    /// Source address (IP:port or MAC)
    pub source: String,

    /// Destination address (IP:port or MAC)
    pub destination: String,

    pub length: usize,

    /// Brief description of the packet
    pub info: String,
}

impl PacketRecord {
    /// Build the list-view summary of this record
    pub fn summary(&self) -> PacketSummary {
        PacketSummary {
            id: self.id,
            timestamp: self.timestamp.wall,
            protocol: self.protocol_label.clone(),
            source: self.format_endpoint(self.src_address, self.src_port, true),
            destination: self.format_endpoint(self.dst_address, self.dst_port, false),
            length: self.length,
            info: self.info(),
        }
    }

    fn format_endpoint(&self, ip: Option<IpAddr>, port: Option<u16>, source: bool) -> String {
        match (ip, port) {
            (Some(IpAddr::V6(ip)), Some(port)) => format!("[{}]:{}", ip, port),
            (Some(ip), Some(port)) => format!("{}:{}", ip, port),
            (Some(ip), None) => ip.to_string(),
            (None, _) => match &self.link_layer {
                Some(LinkLayer::Ethernet { src_mac, dst_mac, .. }) => {
                    if source { src_mac.clone() } else { dst_mac.clone() }
                }
                _ => "Unknown".to_string(),
            },
        }
    }

    /// Short human-readable description
    pub fn info(&self) -> String {
        match (&self.network_layer, &self.transport_layer) {
            (Some(NetworkLayer::Arp { operation, .. }), _) => match operation {
                1 => "ARP Request".to_string(),
                2 => "ARP Reply".to_string(),
                op => format!("ARP op {}", op),
            },
            (_, Some(tcp @ TransportLayer::Tcp { .. })) => {
                let flags = tcp.tcp_flag_names();
                if flags.is_empty() {
                    format!("{} Segment", self.protocol_label)
                } else {
                    format!("{} [{}]", self.protocol_label, flags.join(", "))
                }
            }
            (_, Some(TransportLayer::Udp { .. })) => format!("{} Datagram", self.protocol_label),
            (_, Some(TransportLayer::Icmp { icmp_type, icmp_code, .. })) => {
                format!("{} type {} code {}", self.protocol_label, icmp_type, icmp_code)
            }
            _ => format!("{} Packet", self.protocol_label),
        }
    }
}
