use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::utils::error::CaptureResult;
use crate::utils::logging::parse_log_level;

/// Which layer gets to name a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    /// Well-known port of the transport layer (e.g. 53 -> DNS)
    Application,
    /// Transport protocol (TCP, UDP, ICMP)
    Transport,
    /// Network protocol (IPv4, IPv6, ARP)
    Network,
}

/// Policy for deriving a packet's protocol label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelPolicy {
    /// Sources consulted in order; the first one that yields a label wins
    pub precedence: Vec<LabelSource>,

    /// Application labels by well-known port
    pub port_hints: BTreeMap<u16, String>,
}

impl Default for LabelPolicy {
    fn default() -> Self {
        let port_hints = [
            (20, "FTP"),
            (21, "FTP"),
            (22, "SSH"),
            (23, "TELNET"),
            (25, "SMTP"),
            (53, "DNS"),
            (67, "DHCP"),
            (68, "DHCP"),
            (80, "HTTP"),
            (110, "POP3"),
            (123, "NTP"),
            (143, "IMAP"),
            (443, "HTTPS"),
            (8080, "HTTP"),
        ]
        .into_iter()
        .map(|(port, label)| (port, label.to_string()))
        .collect();

        Self {
            precedence: vec![
                LabelSource::Application,
                LabelSource::Transport,
                LabelSource::Network,
            ],
            port_hints,
        }
    }
}

/// Capture engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of packets kept in memory
    pub buffer_capacity: usize,

    /// Number of source addresses, and of source ports, tracked as top talkers
    pub top_talkers: usize,

    /// Width of the trailing window used for rates, in seconds
    pub rate_window_secs: u64,

    /// Maximum bytes captured per packet
    pub snaplen: i32,

    /// Read timeout of the capture handle; bounds how long stop() waits on an idle link
    pub read_timeout_ms: i32,

    /// Enable promiscuous mode
    pub promiscuous: bool,

    pub label_policy: LabelPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 1000,
            top_talkers: 10,
            rate_window_secs: 5,
            snaplen: 65535,
            read_timeout_ms: 250,
            promiscuous: true,
            label_policy: LabelPolicy::default(),
        }
    }
}

/// Synthetic traffic settings for demo mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Average number of generated packets per second
    pub packets_per_second: f64,

    /// Fixed RNG seed for reproducible traffic
    pub seed: Option<u64>,
}

impl DemoConfig {
    /// Slowest supported generation rate (one packet every ~17 minutes)
    pub const MIN_RATE: f64 = 0.001;
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            packets_per_second: 5.0,
            seed: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Address the REST API binds to
    pub host: String,

    /// Port for the REST API server
    pub port: u16,

    /// Port for the REST API server in demo mode
    pub demo_port: u16,

    /// Run against synthetic traffic instead of a live interface
    pub demo: bool,

    /// Network interface to capture from on startup
    pub interface: Option<String>,

    /// Capture filter expression applied on startup
    pub filter: Option<String>,

    /// Directory export documents are written to
    pub export_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error, off)
    pub log_level: String,

    pub engine: EngineConfig,

    pub demo_settings: DemoConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            demo_port: 5001,
            demo: false,
            interface: None,
            filter: None,
            export_dir: PathBuf::from("exports"),
            log_level: "info".to_string(),
            engine: EngineConfig::default(),
            demo_settings: DemoConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file; missing fields take their defaults
    pub fn from_file(path: &Path) -> CaptureResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = parse_var(&lookup, "WEB_PORT") {
            self.port = port;
        }
        if let Some(port) = parse_var(&lookup, "DEMO_PORT") {
            self.demo_port = port;
        }
        if let Some(capacity) = parse_var(&lookup, "MAX_PACKETS_IN_MEMORY") {
            self.engine.buffer_capacity = capacity;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Port the API should listen on for the selected mode
    pub fn listen_port(&self) -> u16 {
        if self.demo {
            self.demo_port
        } else {
            self.port
        }
    }

    /// Validate configuration settings, returning every violation found
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("port must be between 1 and 65535".to_string());
        }
        if self.demo_port == 0 {
            errors.push("demo_port must be between 1 and 65535".to_string());
        }
        if self.port == self.demo_port {
            errors.push("port and demo_port must be different".to_string());
        }
        if self.engine.buffer_capacity < 1 {
            errors.push("buffer_capacity must be at least 1".to_string());
        }
        if self.engine.rate_window_secs < 1 {
            errors.push("rate_window_secs must be at least 1 second".to_string());
        }
        if self.engine.read_timeout_ms < 1 {
            errors.push("read_timeout_ms must be at least 1".to_string());
        }
        if self.engine.label_policy.precedence.is_empty() {
            errors.push("label_policy.precedence must name at least one source".to_string());
        }
        if parse_log_level(&self.log_level).is_none() {
            errors.push(format!("unknown log_level '{}'", self.log_level));
        }
        let rate = self.demo_settings.packets_per_second;
        if !(rate.is_finite() && rate >= DemoConfig::MIN_RATE) {
            errors.push(format!(
                "demo packets_per_second must be a finite number of at least {}",
                DemoConfig::MIN_RATE
            ));
        }

        errors
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}
