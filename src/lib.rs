//! Packet capture and traffic analysis.
//!
//! [`capture::CaptureEngine`] runs one capture session at a time: it compiles a
//! filter, pulls frames from a [`capture::source::CaptureSource`], classifies
//! them and feeds a bounded retention buffer plus running statistics. The
//! same engine drives live capture (`pcap`) and demo mode (synthetic frames).

pub mod api;
pub mod capture;
pub mod console;
pub mod models;
pub mod utils;

pub use capture::{CaptureEngine, DemoEngine, LiveEngine, TrafficMonitor};
pub use utils::error::{CaptureError, CaptureResult};
