//! Capture source abstraction.
//!
//! A [`CaptureSource`] opens handles on interfaces; a handle is a
//! [`FrameStream`], a blocking, non-restartable sequence of raw frames.
//! The capture loop is the only consumer of a stream. Other threads reach it
//! only through its [`WakeHandle`], which unblocks a pending pull on a best
//! effort basis.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::capture::filter::CompiledFilter;
use crate::models::interface::InterfaceInfo;
use crate::utils::error::CaptureResult;

/// Link-layer framing of a capture handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// 14-byte Ethernet header
    Ethernet,
    /// No link header, IP starts at offset 0
    RawIp,
    /// Any other pcap datalink value
    Unsupported(i32),
}

impl LinkType {
    /// Map a pcap/libpcap datalink number
    pub fn from_dlt(dlt: i32) -> Self {
        match dlt {
            1 => LinkType::Ethernet,
            // DLT_RAW (12, 14 on some BSDs), LINKTYPE_RAW, LINKTYPE_IPV4, LINKTYPE_IPV6
            12 | 14 | 101 | 228 | 229 => LinkType::RawIp,
            other => LinkType::Unsupported(other),
        }
    }
}

/// Raw bytes of one captured frame
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Captured bytes (possibly shorter than the wire length)
    pub data: Vec<u8>,

    /// Length of the packet on the wire
    pub wire_len: usize,

    /// Wall-clock capture time
    pub captured_at: DateTime<Utc>,

    pub link_type: LinkType,
}

impl RawFrame {
    /// An Ethernet frame captured now, with wire length equal to the data length
    pub fn ethernet(data: Vec<u8>) -> Self {
        Self {
            wire_len: data.len(),
            data,
            captured_at: Utc::now(),
            link_type: LinkType::Ethernet,
        }
    }
}

/// Outcome of one pull from a frame stream
#[derive(Debug)]
pub enum FramePoll {
    /// A frame arrived
    Frame(RawFrame),
    /// No frame within the read timeout, or the pull was woken
    Idle,
    /// The source is exhausted; no more frames will arrive
    Closed,
}

/// Best-effort unblock of a pending [`FrameStream::next_frame`] call
#[derive(Clone)]
pub struct WakeHandle(Arc<dyn Fn() + Send + Sync>);

impl WakeHandle {
    pub fn new<F>(wake: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self(Arc::new(wake))
    }

    pub fn wake(&self) {
        (self.0)()
    }
}

impl fmt::Debug for WakeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WakeHandle")
    }
}

/// An open capture handle
pub trait FrameStream: Send + 'static {
    /// Block until the next frame, a timeout, a wake-up or the end of the stream.
    ///
    /// An `Err` means the handle failed and the session cannot continue.
    fn next_frame(&mut self) -> CaptureResult<FramePoll>;

    /// Handle other threads use to unblock a pending pull
    fn wake_handle(&self) -> WakeHandle;
}

/// Platform packet-capture facility
pub trait CaptureSource: Send + Sync + 'static {
    type Stream: FrameStream;

    /// Interfaces that can be opened, in platform order
    fn list_interfaces(&self) -> CaptureResult<Vec<InterfaceInfo>>;

    /// Open a new handle on `interface` restricted by `filter`
    fn open(&self, interface: &str, filter: &CompiledFilter) -> CaptureResult<Self::Stream>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_link_type_from_dlt() {
        assert_eq!(LinkType::from_dlt(1), LinkType::Ethernet);
        assert_eq!(LinkType::from_dlt(101), LinkType::RawIp);
        assert_eq!(LinkType::from_dlt(113), LinkType::Unsupported(113));
    }

    #[test]
    fn test_wake_handle_clones_share_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = WakeHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handle.clone().wake();
        handle.wake();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
