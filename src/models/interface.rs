use serde::{Deserialize, Serialize};

/// A capturable network interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    /// Name passed to the capture source when opening a handle
    pub device_name: String,

    pub description: Option<String>,

    /// First IPv4 address, if any
    pub ipv4_address: Option<String>,

    pub mac_address: Option<String>,

    pub is_loopback: bool,

    pub is_up: bool,
}

impl InterfaceInfo {
    /// An interface known only by name, assumed up
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            description: None,
            ipv4_address: None,
            mac_address: None,
            is_loopback: false,
            is_up: true,
        }
    }

    /// `name (ipv4)`, or just the name
    pub fn formatted_display(&self) -> String {
        match &self.ipv4_address {
            Some(ip) => format!("{} ({})", self.device_name, ip),
            None => self.device_name.clone(),
        }
    }

    /// Short state flags for listings
    pub fn flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        flags.push(if self.is_up { "up" } else { "down" });
        if self.is_loopback {
            flags.push("loopback");
        }
        flags
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_ipv4(mut self, ipv4: Option<String>) -> Self {
        self.ipv4_address = ipv4;
        self
    }

    pub fn with_mac(mut self, mac: Option<String>) -> Self {
        self.mac_address = mac;
        self
    }
}
