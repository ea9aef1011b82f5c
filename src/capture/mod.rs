pub mod aggregator;
pub mod buffer;
pub mod classifier;
pub mod engine;
pub mod filter;
pub mod frames;
pub mod pcap_source;
pub mod source;
pub mod synthetic;

pub use engine::{CaptureEngine, DemoEngine, LiveEngine, TrafficMonitor};
