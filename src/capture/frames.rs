//! Builders for well-formed frames.
//!
//! Used by the synthetic source to produce demo traffic and by tests to feed
//! the classifier. Transport checksums are left zero.

use std::net::{Ipv4Addr, Ipv6Addr};

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_IPV6: u16 = 0x86DD;

pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;

pub const TCP_FIN: u8 = 0x01;
pub const TCP_SYN: u8 = 0x02;
pub const TCP_RST: u8 = 0x04;
pub const TCP_PSH: u8 = 0x08;
pub const TCP_ACK: u8 = 0x10;

const DEFAULT_TTL: u8 = 64;

/// Locally administered MAC address ending in `n`
pub fn mac(n: u8) -> [u8; 6] {
    [0x02, 0x00, 0x5e, 0x00, 0x00, n]
}

/// Ethernet II frame
pub fn ethernet_frame(src: [u8; 6], dst: [u8; 6], ethertype: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(14 + payload.len());
    frame.extend_from_slice(&dst);
    frame.extend_from_slice(&src);
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// IPv4 packet with a 20-byte header and a valid header checksum
pub fn ipv4_packet(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, payload: &[u8]) -> Vec<u8> {
    let total_len = (20 + payload.len()) as u16;
    let mut packet = Vec::with_capacity(total_len as usize);
    packet.push(0x45);
    packet.push(0);
    packet.extend_from_slice(&total_len.to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x01]); // identification
    packet.extend_from_slice(&[0x40, 0x00]); // don't fragment
    packet.push(DEFAULT_TTL);
    packet.push(protocol);
    packet.extend_from_slice(&[0, 0]);
    packet.extend_from_slice(&src.octets());
    packet.extend_from_slice(&dst.octets());

    let checksum = internet_checksum(&packet);
    packet[10..12].copy_from_slice(&checksum.to_be_bytes());

    packet.extend_from_slice(payload);
    packet
}

/// IPv6 packet without extension headers
pub fn ipv6_packet(src: Ipv6Addr, dst: Ipv6Addr, next_header: u8, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(40 + payload.len());
    packet.extend_from_slice(&[0x60, 0, 0, 0]);
    packet.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    packet.push(next_header);
    packet.push(DEFAULT_TTL);
    packet.extend_from_slice(&src.octets());
    packet.extend_from_slice(&dst.octets());
    packet.extend_from_slice(payload);
    packet
}

/// TCP segment with a 20-byte header
pub fn tcp_segment(src_port: u16, dst_port: u16, flags: u8, payload: &[u8]) -> Vec<u8> {
    let mut segment = Vec::with_capacity(20 + payload.len());
    segment.extend_from_slice(&src_port.to_be_bytes());
    segment.extend_from_slice(&dst_port.to_be_bytes());
    segment.extend_from_slice(&1000u32.to_be_bytes()); // sequence
    let ack: u32 = if flags & TCP_ACK != 0 { 2000 } else { 0 };
    segment.extend_from_slice(&ack.to_be_bytes());
    segment.push(5 << 4);
    segment.push(flags);
    segment.extend_from_slice(&64240u16.to_be_bytes());
    segment.extend_from_slice(&[0, 0, 0, 0]); // checksum, urgent pointer
    segment.extend_from_slice(payload);
    segment
}

/// UDP datagram
pub fn udp_datagram(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let length = (8 + payload.len()) as u16;
    let mut datagram = Vec::with_capacity(length as usize);
    datagram.extend_from_slice(&src_port.to_be_bytes());
    datagram.extend_from_slice(&dst_port.to_be_bytes());
    datagram.extend_from_slice(&length.to_be_bytes());
    datagram.extend_from_slice(&[0, 0]);
    datagram.extend_from_slice(payload);
    datagram
}

/// Ethernet/IPv4/TCP frame
pub fn tcp_frame(
    src: Ipv4Addr,
    src_port: u16,
    dst: Ipv4Addr,
    dst_port: u16,
    flags: u8,
    payload: &[u8],
) -> Vec<u8> {
    let segment = tcp_segment(src_port, dst_port, flags, payload);
    let packet = ipv4_packet(src, dst, IPPROTO_TCP, &segment);
    ethernet_frame(mac(1), mac(2), ETHERTYPE_IPV4, &packet)
}

/// Ethernet/IPv4/UDP frame
pub fn udp_frame(src: Ipv4Addr, src_port: u16, dst: Ipv4Addr, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let datagram = udp_datagram(src_port, dst_port, payload);
    let packet = ipv4_packet(src, dst, IPPROTO_UDP, &datagram);
    ethernet_frame(mac(1), mac(2), ETHERTYPE_IPV4, &packet)
}

/// Ethernet/IPv4 ICMP echo request
pub fn icmp_echo_frame(src: Ipv4Addr, dst: Ipv4Addr, sequence: u16) -> Vec<u8> {
    let mut message = vec![8, 0, 0, 0, 0x12, 0x34];
    message.extend_from_slice(&sequence.to_be_bytes());
    message.extend_from_slice(b"ping");
    let checksum = internet_checksum(&message);
    message[2..4].copy_from_slice(&checksum.to_be_bytes());

    let packet = ipv4_packet(src, dst, IPPROTO_ICMP, &message);
    ethernet_frame(mac(1), mac(2), ETHERTYPE_IPV4, &packet)
}

/// Broadcast ARP who-has request
pub fn arp_request_frame(sender_mac: [u8; 6], sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Vec<u8> {
    let mut arp = Vec::with_capacity(28);
    arp.extend_from_slice(&[0x00, 0x01]); // ethernet
    arp.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
    arp.push(6);
    arp.push(4);
    arp.extend_from_slice(&[0x00, 0x01]); // request
    arp.extend_from_slice(&sender_mac);
    arp.extend_from_slice(&sender_ip.octets());
    arp.extend_from_slice(&[0; 6]);
    arp.extend_from_slice(&target_ip.octets());

    ethernet_frame(sender_mac, [0xff; 6], ETHERTYPE_ARP, &arp)
}

/// RFC 1071 ones' complement checksum
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = data
        .chunks(2)
        .map(|chunk| {
            let hi = chunk[0] as u32;
            let lo = chunk.get(1).copied().unwrap_or(0) as u32;
            (hi << 8) | lo
        })
        .sum();

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}
