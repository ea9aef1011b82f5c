use log::{log_enabled, trace, Level};
use pnet::packet::{
    arp::ArpPacket,
    ethernet::{EtherTypes, EthernetPacket},
    icmp::IcmpPacket,
    icmpv6::Icmpv6Packet,
    ipv4::Ipv4Packet,
    ipv6::Ipv6Packet,
    tcp::TcpPacket,
    udp::UdpPacket,
    Packet as PnetPacket,
};
use std::fmt::Write;
use std::net::IpAddr;

use crate::capture::source::{LinkType, RawFrame};
use crate::models::config::{LabelPolicy, LabelSource};
use crate::models::packet::{LinkLayer, NetworkLayer, PacketRecord, PacketTimestamp, TransportLayer};
use crate::utils::error::ClassificationError;

/// Label used when no layer yields one
pub const FALLBACK_LABEL: &str = "OTHER";

const ETHERTYPE_VLAN: u16 = 0x8100;
const VLAN_TAG_LEN: usize = 4;
const IPV4_MIN_HLEN: usize = 20;
const IPV6_HLEN: usize = 40;

const PROTO_ICMP: u8 = 1;
const PROTO_TCP: u8 = 6;
const PROTO_UDP: u8 = 17;
const PROTO_ICMPV6: u8 = 58;

// IPv6 extension headers walked before the transport header
const EXT_HOP_BY_HOP: u8 = 0;
const EXT_ROUTING: u8 = 43;
const EXT_FRAGMENT: u8 = 44;
const EXT_DEST_OPTIONS: u8 = 60;
const MAX_EXT_HEADERS: usize = 8;

type LayerResult = Result<(), ClassificationError>;

/// Per-record metadata supplied by the capture loop
#[derive(Debug, Clone, Copy)]
pub struct RecordMeta<'a> {
    pub id: u64,
    pub interface: &'a str,
    pub timestamp: PacketTimestamp,
}

/// Result of classifying one frame
#[derive(Debug, Clone)]
pub struct Classification {
    pub record: PacketRecord,

    /// Set when the frame could only be partially classified
    pub issue: Option<ClassificationError>,
}

/// Layers decoded so far; kept when a deeper layer turns out to be truncated
#[derive(Default)]
struct Layers {
    link: Option<LinkLayer>,
    network: Option<NetworkLayer>,
    transport: Option<TransportLayer>,
    src_address: Option<IpAddr>,
    dst_address: Option<IpAddr>,
    src_port: Option<u16>,
    dst_port: Option<u16>,
    payload_preview: Option<String>,
}

/// Payload bytes kept as a hex preview
const PAYLOAD_PREVIEW_BYTES: usize = 100;

fn payload_preview(payload: &[u8]) -> Option<String> {
    if payload.is_empty() {
        return None;
    }
    let mut hex = String::with_capacity(PAYLOAD_PREVIEW_BYTES * 2);
    for byte in payload.iter().take(PAYLOAD_PREVIEW_BYTES) {
        let _ = write!(hex, "{:02x}", byte);
    }
    Some(hex)
}

/// Parses raw frames into packet records. Never fails: malformed input
/// degrades to a partially populated record.
#[derive(Debug, Clone, Default)]
pub struct PacketClassifier {
    policy: LabelPolicy,
}

impl PacketClassifier {
    /// Create a new classifier with the given labelling policy
    pub fn new(policy: LabelPolicy) -> Self {
        Self { policy }
    }

    /// Classify a frame, returning only the record
    pub fn classify_record(&self, frame: &RawFrame, meta: RecordMeta<'_>) -> PacketRecord {
        self.classify(frame, meta).record
    }

    /// Classify a frame into a record plus the reason it was only partially decoded, if any
    pub fn classify(&self, frame: &RawFrame, meta: RecordMeta<'_>) -> Classification {
        let mut layers = Layers::default();

        let outcome = match frame.link_type {
            LinkType::Ethernet => self.parse_ethernet(&frame.data, &mut layers),
            LinkType::RawIp => {
                layers.link = Some(LinkLayer::RawIp);
                self.parse_raw_ip(&frame.data, &mut layers)
            }
            LinkType::Unsupported(dlt) => {
                layers.link = Some(LinkLayer::Unknown);
                if log_enabled!(Level::Trace) {
                    trace!("Unsupported datalink type {}, frame left unclassified", dlt);
                }
                Ok(())
            }
        };

        let protocol_label = self.derive_label(&layers);

        if log_enabled!(Level::Trace) {
            trace!(
                "Classified frame #{} ({} bytes) as {}",
                meta.id,
                frame.data.len(),
                protocol_label
            );
        }

        Classification {
            record: PacketRecord {
                id: meta.id,
                timestamp: meta.timestamp,
                interface: meta.interface.to_string(),
                length: frame.wire_len.max(frame.data.len()),
                link_layer: layers.link,
                network_layer: layers.network,
                transport_layer: layers.transport,
                src_address: layers.src_address,
                dst_address: layers.dst_address,
                src_port: layers.src_port,
                dst_port: layers.dst_port,
                protocol_label,
                payload_preview: layers.payload_preview,
            },
            issue: outcome.err(),
        }
    }

    /// Parse Ethernet frame
    fn parse_ethernet(&self, data: &[u8], layers: &mut Layers) -> LayerResult {
        let eth_packet = match EthernetPacket::new(data) {
            Some(packet) => packet,
            None => {
                layers.link = Some(LinkLayer::Unknown);
                return Err(truncated("ethernet", EthernetPacket::minimum_packet_size(), data.len()));
            }
        };

        let mut ethertype = eth_packet.get_ethertype().0;
        let mut payload = eth_packet.payload();
        let mut vlan = None;

        if ethertype == ETHERTYPE_VLAN {
            if payload.len() < VLAN_TAG_LEN {
                layers.link = Some(LinkLayer::Ethernet {
                    src_mac: eth_packet.get_source().to_string(),
                    dst_mac: eth_packet.get_destination().to_string(),
                    ethertype,
                    vlan: None,
                });
                return Err(truncated("vlan", VLAN_TAG_LEN, payload.len()));
            }
            vlan = Some(u16::from_be_bytes([payload[0], payload[1]]) & 0x0fff);
            ethertype = u16::from_be_bytes([payload[2], payload[3]]);
            payload = &payload[VLAN_TAG_LEN..];
        }

        layers.link = Some(LinkLayer::Ethernet {
            src_mac: eth_packet.get_source().to_string(),
            dst_mac: eth_packet.get_destination().to_string(),
            ethertype,
            vlan,
        });

        match ethertype {
            t if t == EtherTypes::Ipv4.0 => self.parse_ipv4(payload, layers),
            t if t == EtherTypes::Ipv6.0 => self.parse_ipv6(payload, layers),
            t if t == EtherTypes::Arp.0 => self.parse_arp(payload, layers),
            other => {
                layers.network = Some(NetworkLayer::Unknown { ethertype: other });
                Ok(())
            }
        }
    }

    /// Parse a frame without link header, dispatching on the IP version nibble
    fn parse_raw_ip(&self, data: &[u8], layers: &mut Layers) -> LayerResult {
        match data.first().map(|b| b >> 4) {
            Some(4) => self.parse_ipv4(data, layers),
            Some(6) => self.parse_ipv6(data, layers),
            Some(version) => {
                layers.network = Some(NetworkLayer::Unknown { ethertype: 0 });
                Err(ClassificationError::Malformed {
                    layer: "ip",
                    detail: format!("unknown IP version {}", version),
                })
            }
            None => Err(truncated("ip", 1, 0)),
        }
    }

    /// Parse IPv4 packet
    fn parse_ipv4(&self, data: &[u8], layers: &mut Layers) -> LayerResult {
        let ipv4_packet = match Ipv4Packet::new(data) {
            Some(packet) => packet,
            None => {
                layers.network = Some(NetworkLayer::Unknown { ethertype: EtherTypes::Ipv4.0 });
                return Err(truncated("ipv4", IPV4_MIN_HLEN, data.len()));
            }
        };

        let protocol = ipv4_packet.get_next_level_protocol().0;
        layers.src_address = Some(IpAddr::V4(ipv4_packet.get_source()));
        layers.dst_address = Some(IpAddr::V4(ipv4_packet.get_destination()));
        layers.network = Some(NetworkLayer::Ipv4 {
            ttl: ipv4_packet.get_ttl(),
            protocol,
        });

        if log_enabled!(Level::Trace) {
            trace!(
                "IPv4 - src: {}, dst: {}, proto: {}",
                ipv4_packet.get_source(),
                ipv4_packet.get_destination(),
                protocol
            );
        }

        let header_len = ipv4_packet.get_header_length() as usize * 4;
        if header_len < IPV4_MIN_HLEN {
            layers.transport = Some(TransportLayer::Unknown { protocol });
            return Err(ClassificationError::Malformed {
                layer: "ipv4",
                detail: format!("header length {} below minimum", header_len),
            });
        }
        if header_len > data.len() {
            layers.transport = Some(TransportLayer::Unknown { protocol });
            return Err(truncated("ipv4 options", header_len, data.len()));
        }

        // Later fragments carry no transport header
        if ipv4_packet.get_fragment_offset() != 0 {
            layers.transport = Some(TransportLayer::Unknown { protocol });
            return Ok(());
        }

        // Trust total_length only when it is consistent; offloaded frames often report 0
        let total_len = ipv4_packet.get_total_length() as usize;
        let end = if total_len >= header_len {
            total_len.min(data.len())
        } else {
            data.len()
        };

        self.parse_transport(protocol, &data[header_len..end], layers)
    }

    /// Parse IPv6 packet
    fn parse_ipv6(&self, data: &[u8], layers: &mut Layers) -> LayerResult {
        let ipv6_packet = match Ipv6Packet::new(data) {
            Some(packet) => packet,
            None => {
                layers.network = Some(NetworkLayer::Unknown { ethertype: EtherTypes::Ipv6.0 });
                return Err(truncated("ipv6", IPV6_HLEN, data.len()));
            }
        };

        let mut next_header = ipv6_packet.get_next_header().0;
        layers.src_address = Some(IpAddr::V6(ipv6_packet.get_source()));
        layers.dst_address = Some(IpAddr::V6(ipv6_packet.get_destination()));
        layers.network = Some(NetworkLayer::Ipv6 {
            hop_limit: ipv6_packet.get_hop_limit(),
            next_header,
        });

        // A zero payload length means a jumbogram; use whatever was captured
        let payload_len = ipv6_packet.get_payload_length() as usize;
        let end = if payload_len == 0 {
            data.len()
        } else {
            (IPV6_HLEN + payload_len).min(data.len())
        };
        let mut payload = &data[IPV6_HLEN..end];

        for _ in 0..MAX_EXT_HEADERS {
            match next_header {
                EXT_HOP_BY_HOP | EXT_ROUTING | EXT_DEST_OPTIONS | EXT_FRAGMENT => {
                    if payload.len() < 8 {
                        layers.transport = Some(TransportLayer::Unknown { protocol: next_header });
                        return Err(truncated("ipv6 extension", 8, payload.len()));
                    }
                    let ext_len = if next_header == EXT_FRAGMENT {
                        // Non-first fragments have no transport header
                        let offset = u16::from_be_bytes([payload[2], payload[3]]) >> 3;
                        if offset != 0 {
                            layers.transport = Some(TransportLayer::Unknown { protocol: payload[0] });
                            return Ok(());
                        }
                        8
                    } else {
                        (payload[1] as usize + 1) * 8
                    };
                    if payload.len() < ext_len {
                        layers.transport = Some(TransportLayer::Unknown { protocol: next_header });
                        return Err(truncated("ipv6 extension", ext_len, payload.len()));
                    }
                    next_header = payload[0];
                    payload = &payload[ext_len..];
                }
                _ => break,
            }
        }

        self.parse_transport(next_header, payload, layers)
    }

    /// Parse ARP packet
    fn parse_arp(&self, data: &[u8], layers: &mut Layers) -> LayerResult {
        let arp_packet = match ArpPacket::new(data) {
            Some(packet) => packet,
            None => {
                layers.network = Some(NetworkLayer::Unknown { ethertype: EtherTypes::Arp.0 });
                return Err(truncated("arp", ArpPacket::minimum_packet_size(), data.len()));
            }
        };

        layers.network = Some(NetworkLayer::Arp {
            operation: arp_packet.get_operation().0,
            sender_mac: arp_packet.get_sender_hw_addr().to_string(),
            target_mac: arp_packet.get_target_hw_addr().to_string(),
        });
        layers.src_address = Some(IpAddr::V4(arp_packet.get_sender_proto_addr()));
        layers.dst_address = Some(IpAddr::V4(arp_packet.get_target_proto_addr()));

        // No further parsing required for ARP
        Ok(())
    }

    /// Parse transport layer protocols
    fn parse_transport(&self, protocol: u8, data: &[u8], layers: &mut Layers) -> LayerResult {
        if log_enabled!(Level::Trace) {
            trace!("Transport protocol: {}, data length: {}", protocol, data.len());
        }

        // Pessimistic default, replaced once the header decodes
        layers.transport = Some(TransportLayer::Unknown { protocol });

        match protocol {
            PROTO_TCP => {
                let tcp_packet = TcpPacket::new(data)
                    .ok_or_else(|| truncated("tcp", TcpPacket::minimum_packet_size(), data.len()))?;
                layers.src_port = Some(tcp_packet.get_source());
                layers.dst_port = Some(tcp_packet.get_destination());
                layers.transport = Some(TransportLayer::Tcp {
                    flags: tcp_packet.get_flags() as u16,
                    sequence: tcp_packet.get_sequence(),
                    acknowledgement: tcp_packet.get_acknowledgement(),
                    window: tcp_packet.get_window(),
                });
                layers.payload_preview = payload_preview(tcp_packet.payload());
            }
            PROTO_UDP => {
                let udp_packet = UdpPacket::new(data)
                    .ok_or_else(|| truncated("udp", UdpPacket::minimum_packet_size(), data.len()))?;
                layers.src_port = Some(udp_packet.get_source());
                layers.dst_port = Some(udp_packet.get_destination());
                layers.transport = Some(TransportLayer::Udp {
                    length: udp_packet.get_length(),
                });
                layers.payload_preview = payload_preview(udp_packet.payload());
            }
            PROTO_ICMP => {
                let icmp_packet = IcmpPacket::new(data)
                    .ok_or_else(|| truncated("icmp", IcmpPacket::minimum_packet_size(), data.len()))?;
                layers.transport = Some(TransportLayer::Icmp {
                    icmp_type: icmp_packet.get_icmp_type().0,
                    icmp_code: icmp_packet.get_icmp_code().0,
                    v6: false,
                });
            }
            PROTO_ICMPV6 => {
                let icmp_packet = Icmpv6Packet::new(data).ok_or_else(|| {
                    truncated("icmpv6", Icmpv6Packet::minimum_packet_size(), data.len())
                })?;
                layers.transport = Some(TransportLayer::Icmp {
                    icmp_type: icmp_packet.get_icmpv6_type().0,
                    icmp_code: icmp_packet.get_icmpv6_code().0,
                    v6: true,
                });
            }
            _ => {}
        }

        Ok(())
    }

    /// Pick the protocol label following the configured precedence
    fn derive_label(&self, layers: &Layers) -> String {
        for source in &self.policy.precedence {
            let label = match source {
                LabelSource::Application => self.application_hint(layers),
                LabelSource::Transport => layers.transport.as_ref().and_then(TransportLayer::label),
                LabelSource::Network => layers.network.as_ref().and_then(NetworkLayer::label),
            };
            if let Some(label) = label {
                return label.to_string();
            }
        }

        FALLBACK_LABEL.to_string()
    }

    /// Application label from a well-known port; destination port wins over source
    fn application_hint(&self, layers: &Layers) -> Option<&str> {
        let has_ports = layers
            .transport
            .as_ref()
            .map_or(false, TransportLayer::has_ports);
        if !has_ports {
            return None;
        }

        [layers.dst_port, layers.src_port]
            .into_iter()
            .flatten()
            .find_map(|port| self.policy.port_hints.get(&port))
            .map(String::as_str)
    }
}

fn truncated(layer: &'static str, needed: usize, available: usize) -> ClassificationError {
    ClassificationError::Truncated {
        layer,
        needed,
        available,
    }
}
