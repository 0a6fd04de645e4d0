//! Data models for the fleet monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role assigned to devices the classifier could not identify
pub const ROLE_UNKNOWN: &str = "unknown";

/// A managed device polled for health metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub name: String,
    /// Management address (IP or resolvable host)
    pub host: String,
    /// Opaque reference into the credentials store, never the secret itself
    pub credentials_ref: String,
    pub is_online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<u64>,
    /// Device exposes wireless interfaces (learned from capability probes)
    #[serde(default)]
    pub has_wireless: bool,
    /// Device runs an AP controller (learned from capability probes)
    #[serde(default)]
    pub has_ap_controller: bool,
}

impl Device {
    /// Canonical minimal constructor to avoid field drift across call-sites.
    pub fn new(name: impl Into<String>, host: impl Into<String>, credentials_ref: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            host: host.into(),
            credentials_ref: credentials_ref.into(),
            is_online: false,
            last_seen: None,
            uptime_seconds: None,
            has_wireless: false,
            has_ap_controller: false,
        }
    }
}

/// How a discovery sighting reached the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionMethod {
    Arp,
    Dhcp,
    PortScan,
    Manual,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Arp => "arp",
            DetectionMethod::Dhcp => "dhcp",
            DetectionMethod::PortScan => "port-scan",
            DetectionMethod::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "arp" => Some(DetectionMethod::Arp),
            "dhcp" => Some(DetectionMethod::Dhcp),
            "port-scan" => Some(DetectionMethod::PortScan),
            "manual" => Some(DetectionMethod::Manual),
            _ => None,
        }
    }
}

/// A device observed on the network, keyed by hardware address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub id: i64,
    /// Normalized lowercase colon-hex, or an `unknown_<ip>` sentinel until a
    /// MAC-bearing sighting arrives
    pub mac: String,
    /// Latest known address; updated on every sighting
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    pub role: String,
    pub is_identified: bool,
    /// Identity confidence 0-100, monotonically non-decreasing
    pub identification_score: u8,
    /// Open ports, banners, protocol class, classification trace, source extras
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub is_online: bool,
}

impl DiscoveredDevice {
    /// Canonical minimal constructor to avoid field drift across call-sites.
    pub fn new(mac: impl Into<String>, ip: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            mac: mac.into(),
            ip: ip.into(),
            hostname: None,
            vendor: None,
            role: ROLE_UNKNOWN.to_string(),
            is_identified: false,
            identification_score: 0,
            metadata: serde_json::json!({}),
            first_seen: now,
            last_seen: now,
            is_online: true,
        }
    }

    /// Raise the identification score to `candidate` if higher. The score
    /// never decreases and never exceeds 100.
    pub fn absorb_score(&mut self, candidate: u8) {
        self.identification_score = self.identification_score.max(candidate).min(100);
    }

    /// Shallow-merge `extra` into the metadata bag, preferring new non-empty
    /// values and keeping old ones where the new value is null or empty.
    pub fn merge_metadata(&mut self, extra: &serde_json::Value) {
        let Some(incoming) = extra.as_object() else {
            return;
        };
        if !self.metadata.is_object() {
            self.metadata = serde_json::json!({});
        }
        let Some(bag) = self.metadata.as_object_mut() else {
            return;
        };
        for (key, value) in incoming {
            if is_empty_value(value) {
                continue;
            }
            bag.insert(key.clone(), value.clone());
        }
    }

    /// Human-readable label: hostname, else vendor plus MAC suffix, else a
    /// generic label with the MAC suffix.
    pub fn display_name(&self) -> String {
        if let Some(hostname) = self.hostname.as_deref() {
            if !hostname.is_empty() {
                return hostname.to_string();
            }
        }
        let suffix = mac_suffix(&self.mac);
        match self.vendor.as_deref() {
            Some(vendor) if !vendor.is_empty() => format!("{} {}", vendor, suffix),
            _ => format!("Device {}", suffix),
        }
    }
}

/// Last three octets of a MAC, uppercased without separators.
fn mac_suffix(mac: &str) -> String {
    let hex: String = mac.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    let tail = if hex.len() >= 6 { &hex[hex.len() - 6..] } else { hex.as_str() };
    tail.to_uppercase()
}

fn is_empty_value(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        serde_json::Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// A discovery sighting to be appended to the audit log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryEvent {
    pub mac: String,
    pub ip: String,
    pub method: DetectionMethod,
    /// Managed device whose tables produced the sighting, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_device_id: Option<i64>,
    #[serde(default)]
    pub detail: serde_json::Value,
}

/// A stored discovery audit row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryLogEntry {
    pub id: i64,
    pub mac: String,
    pub ip: String,
    pub method: DetectionMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_device_id: Option<i64>,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Filter for listing discovered devices
#[derive(Debug, Clone, Default)]
pub struct DiscoveredFilter {
    pub identified: Option<bool>,
    pub vendor: Option<String>,
    pub min_score: Option<u8>,
}

/// Point-in-time polling status for one managed device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicePollStatus {
    pub device_id: i64,
    pub name: String,
    pub in_flight: bool,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_polled: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Scheduler status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingStatus {
    pub is_running: bool,
    pub interval_ms: u64,
    pub max_concurrent: usize,
    pub active_in_flight: usize,
    pub devices: Vec<DevicePollStatus>,
}
