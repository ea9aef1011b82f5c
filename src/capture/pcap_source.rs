use chrono::{TimeZone, Utc};
use log::{debug, info, trace, warn};
use parking_lot::RwLock;
use pcap::{Active, BreakLoop, Capture, Device};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::capture::filter::CompiledFilter;
use crate::capture::source::{CaptureSource, FramePoll, FrameStream, LinkType, RawFrame, WakeHandle};
use crate::models::config::EngineConfig;
use crate::models::interface::InterfaceInfo;
use crate::utils::error::{CaptureError, CaptureResult};

/// How long an interface listing is reused
const INTERFACE_CACHE_TTL: Duration = Duration::from_secs(60);

/// Live capture through libpcap/Npcap
pub struct PcapSource {
    snaplen: i32,
    read_timeout_ms: i32,
    promiscuous: bool,

    /// Cached interface info - to avoid repeated expensive calls
    cached_interfaces: RwLock<Option<(Vec<InterfaceInfo>, Instant)>>,
}

impl PcapSource {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            snaplen: config.snaplen,
            read_timeout_ms: config.read_timeout_ms.max(1),
            promiscuous: config.promiscuous,
            cached_interfaces: RwLock::new(None),
        }
    }

    /// Fetch interface information, combining pcap's device list with pnet's link details
    fn fetch_interface_info(&self) -> CaptureResult<Vec<InterfaceInfo>> {
        info!("Fetching network interface information");

        let pnet_interfaces = pnet_datalink::interfaces();

        let devices = match Device::list() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Failed to list pcap devices ({}), falling back to pnet_datalink", e);
                return Ok(pnet_interfaces.iter().map(Self::from_pnet).collect());
            }
        };

        let interfaces = devices
            .into_iter()
            .map(|device| {
                let ipv4 = device.addresses.iter().find_map(|address| match address.addr {
                    IpAddr::V4(v4) => Some(v4.to_string()),
                    IpAddr::V6(_) => None,
                });

                let mut info = InterfaceInfo::new(device.name.clone())
                    .with_description(device.desc.clone())
                    .with_ipv4(ipv4);
                info.is_loopback = device.flags.is_loopback();
                info.is_up = device.flags.is_up();

                if let Some(link) = pnet_interfaces.iter().find(|i| i.name == device.name) {
                    info = info.with_mac(link.mac.map(|mac| mac.to_string()));
                    if info.ipv4_address.is_none() {
                        info.ipv4_address = Self::from_pnet(link).ipv4_address;
                    }
                }

                info
            })
            .collect::<Vec<_>>();

        debug!("Found {} interfaces using pcap", interfaces.len());
        Ok(interfaces)
    }

    /// Convert a pnet interface to our InterfaceInfo format
    fn from_pnet(iface: &pnet_datalink::NetworkInterface) -> InterfaceInfo {
        let ipv4 = iface.ips.iter().find_map(|ip| match ip.ip() {
            IpAddr::V4(v4) => Some(v4.to_string()),
            IpAddr::V6(_) => None,
        });

        let mut info = InterfaceInfo::new(iface.name.clone())
            .with_description((!iface.description.is_empty()).then(|| iface.description.clone()))
            .with_ipv4(ipv4)
            .with_mac(iface.mac.map(|mac| mac.to_string()));
        info.is_loopback = iface.is_loopback();
        info.is_up = iface.is_up();
        info
    }

    /// Whether the interface exists. `None` when the platform cannot tell.
    fn interface_exists(&self, name: &str) -> Option<bool> {
        match Device::list() {
            Ok(devices) => Some(devices.iter().any(|d| d.name == name)),
            Err(e) => {
                debug!("Cannot verify interface {} ({}), letting open decide", name, e);
                None
            }
        }
    }
}

impl CaptureSource for PcapSource {
    type Stream = PcapStream;

    fn list_interfaces(&self) -> CaptureResult<Vec<InterfaceInfo>> {
        {
            let cached = self.cached_interfaces.read();
            if let Some((interfaces, fetched_at)) = &*cached {
                let elapsed = fetched_at.elapsed();
                if elapsed < INTERFACE_CACHE_TTL {
                    debug!(
                        "Using cached interface list ({} interfaces, {}s old)",
                        interfaces.len(),
                        elapsed.as_secs()
                    );
                    return Ok(interfaces.clone());
                }
            }
        }

        let interfaces = self.fetch_interface_info()?;
        *self.cached_interfaces.write() = Some((interfaces.clone(), Instant::now()));
        Ok(interfaces)
    }

    fn open(&self, interface: &str, filter: &CompiledFilter) -> CaptureResult<PcapStream> {
        if self.interface_exists(interface) == Some(false) {
            return Err(CaptureError::InterfaceNotFound(interface.to_string()));
        }

        info!(
            "Opening capture on {} (promiscuous: {}, snaplen: {}, timeout: {}ms)",
            interface, self.promiscuous, self.snaplen, self.read_timeout_ms
        );

        let mut capture = Capture::from_device(interface)
            .map_err(|e| map_open_error(interface, e))?
            .promisc(self.promiscuous)
            .snaplen(self.snaplen)
            .timeout(self.read_timeout_ms)
            .immediate_mode(true)
            .open()
            .map_err(|e| map_open_error(interface, e))?;

        // Kernel-side filtering is an optimisation; records are filtered again in userspace
        if !filter.is_match_all() {
            match capture.filter(filter.expression(), true) {
                Ok(()) => info!("Kernel filter applied: {}", filter.expression()),
                Err(e) => warn!(
                    "libpcap rejected filter '{}' ({}), filtering in userspace only",
                    filter.expression(),
                    e
                ),
            }
        }

        let link_type = LinkType::from_dlt(capture.get_datalink().0);
        if let LinkType::Unsupported(dlt) = link_type {
            warn!("Datalink type {} on {} is not decoded; packets will be labelled OTHER", dlt, interface);
        }

        let breaker = Arc::new(capture.breakloop_handle());

        Ok(PcapStream {
            capture,
            breaker,
            link_type,
            interface: interface.to_string(),
        })
    }
}

/// Open pcap handle
pub struct PcapStream {
    capture: Capture<Active>,
    breaker: Arc<BreakLoop>,
    link_type: LinkType,
    interface: String,
}

impl FrameStream for PcapStream {
    fn next_frame(&mut self) -> CaptureResult<FramePoll> {
        let link_type = self.link_type;

        match self.capture.next_packet() {
            Ok(packet) => {
                let header = packet.header;
                let micros = (header.ts.tv_usec as u32).min(999_999);
                let captured_at = Utc
                    .timestamp_opt(header.ts.tv_sec as i64, micros * 1_000)
                    .single()
                    .unwrap_or_else(Utc::now);

                Ok(FramePoll::Frame(RawFrame {
                    data: packet.data.to_vec(),
                    wire_len: header.len as usize,
                    captured_at,
                    link_type,
                }))
            }
            Err(pcap::Error::TimeoutExpired) => {
                trace!("Packet capture timed out, continuing");
                Ok(FramePoll::Idle)
            }
            // Also what a pull interrupted by pcap_breakloop returns
            Err(pcap::Error::NoMorePackets) => Ok(FramePoll::Closed),
            Err(e) => Err(CaptureError::SourceFailure(format!(
                "capture on {} failed: {}",
                self.interface, e
            ))),
        }
    }

    /// Interrupts a pending pull with `pcap_breakloop`; the read timeout still bounds it
    fn wake_handle(&self) -> WakeHandle {
        let breaker = self.breaker.clone();
        WakeHandle::new(move || breaker.breakloop())
    }
}

/// Map a libpcap open/activate failure to the engine's error taxonomy
fn map_open_error(interface: &str, err: pcap::Error) -> CaptureError {
    let detail = err.to_string();
    let lower = detail.to_lowercase();

    if lower.contains("permission")
        || lower.contains("not permitted")
        || lower.contains("access is denied")
    {
        CaptureError::InsufficientPrivilege {
            interface: interface.to_string(),
            detail,
        }
    } else if lower.contains("no such device") || lower.contains("doesn't exist") {
        CaptureError::InterfaceNotFound(interface.to_string())
    } else {
        CaptureError::SourceFailure(format!("failed to open {}: {}", interface, detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_errors_map_to_privilege() {
        let err = map_open_error(
            "eth0",
            pcap::Error::PcapError("eth0: You don't have permission to capture on that device".into()),
        );
        assert!(matches!(err, CaptureError::InsufficientPrivilege { ref interface, .. } if interface == "eth0"));

        let err = map_open_error("eth0", pcap::Error::PcapError("socket: Operation not permitted".into()));
        assert!(matches!(err, CaptureError::InsufficientPrivilege { .. }));
    }

    #[test]
    fn test_missing_device_maps_to_not_found() {
        let err = map_open_error("nope0", pcap::Error::PcapError("nope0: No such device exists".into()));
        assert!(matches!(err, CaptureError::InterfaceNotFound(ref name) if name == "nope0"));

        let err = map_open_error("eth0", pcap::Error::PcapError("device busy".into()));
        assert!(matches!(err, CaptureError::SourceFailure(_)));
    }

    #[test]
    fn test_open_unknown_interface_fails() {
        let source = PcapSource::new(&EngineConfig::default());
        let result = source.open("netsniffer-missing0", &CompiledFilter::match_all());
        assert!(matches!(
            result,
            Err(CaptureError::InterfaceNotFound(_)) | Err(CaptureError::InsufficientPrivilege { .. })
        ));
    }
}
