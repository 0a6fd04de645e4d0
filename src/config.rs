//! Configuration constants and runtime tunables for the fleet monitor

use std::time::Duration;

// ====== Polling Configuration ======

/// Default polling cycle interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// Minimum polling cycle interval in milliseconds
pub const MIN_POLL_INTERVAL_MS: u64 = 5_000;

/// Default number of devices polled concurrently
pub const DEFAULT_MAX_CONCURRENT_POLLS: usize = 5;

/// Minimum concurrency (a zero would stall the scheduler)
pub const MIN_MAX_CONCURRENT_POLLS: usize = 1;

/// Timeout for one metrics-collection attempt against a device
pub const POLL_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for establishing the management connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Consecutive failures before a device is declared offline
pub const POLL_MAX_RETRIES: u32 = 3;

/// Delay before retrying a failed poll attempt within the same turn
pub const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

// ====== Discovery Configuration ======

/// Default passive-discovery cadence in minutes
pub const DEFAULT_DISCOVERY_INTERVAL_MIN: u64 = 5;

/// Default re-identification cadence in minutes
pub const DEFAULT_IDENTIFICATION_INTERVAL_MIN: u64 = 10;

/// Default router-table harvest cadence in minutes
pub const DEFAULT_ROUTER_DISCOVERY_INTERVAL_MIN: u64 = 5;

/// Floor for all discovery cadences in minutes
pub const MIN_DISCOVERY_INTERVAL_MIN: u64 = 1;

/// Hours without a sighting before a discovered device is marked offline
pub const STALE_DEVICE_THRESHOLD_HOURS: i64 = 24;

// ====== Subnet Sweep Configuration ======

/// Ports probed during an active subnet sweep
pub const SWEEP_PROBE_PORTS: &[u16] = &[22, 23, 80, 443, 8080, 8443];

/// Timeout for each TCP connect probe
pub const SWEEP_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Maximum concurrent TCP probes during a sweep
pub const MAX_CONCURRENT_PROBES: usize = 16;

/// Maximum hosts expanded from a sweep CIDR (prevents scanning huge ranges)
pub const MAX_SWEEP_HOSTS: usize = 4096;

// ====== Vendor Resolution Configuration ======

/// Days a persisted vendor-cache entry stays valid
pub const VENDOR_CACHE_TTL_DAYS: i64 = 30;

/// Timeout for a single external vendor lookup
pub const VENDOR_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimum spacing between consecutive external vendor lookups
pub const VENDOR_LOOKUP_SPACING: Duration = Duration::from_secs(1);

/// External per-MAC vendor lookup endpoint; `{mac}` is replaced by the OUI
pub const VENDOR_API_URL: &str = "https://api.macvendors.com/{mac}";

/// Full OUI registry download used by the bulk vendor import
pub const OUI_REGISTRY_URL: &str = "https://standards-oui.ieee.org/oui/oui.csv";

/// Rows per transaction during the bulk vendor import
pub const VENDOR_IMPORT_BATCH: usize = 500;

/// Runtime polling tunables. The builders clamp to the documented floors;
/// live reconfiguration on the scheduler rejects out-of-range values instead.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval_ms: u64,
    pub max_concurrent: usize,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_concurrent: DEFAULT_MAX_CONCURRENT_POLLS,
            request_timeout: POLL_REQUEST_TIMEOUT,
            max_retries: POLL_MAX_RETRIES,
            retry_delay: POLL_RETRY_DELAY,
        }
    }
}

impl PollerConfig {
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms.max(MIN_POLL_INTERVAL_MS);
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(MIN_MAX_CONCURRENT_POLLS);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Runtime discovery tunables. Cadences are clamped to one minute.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub discovery_interval_min: u64,
    pub identification_interval_min: u64,
    pub router_discovery_interval_min: u64,
    pub probe_ports: Vec<u16>,
    pub probe_timeout: Duration,
    pub max_concurrent_probes: usize,
    pub stale_after_hours: i64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            discovery_interval_min: DEFAULT_DISCOVERY_INTERVAL_MIN,
            identification_interval_min: DEFAULT_IDENTIFICATION_INTERVAL_MIN,
            router_discovery_interval_min: DEFAULT_ROUTER_DISCOVERY_INTERVAL_MIN,
            probe_ports: SWEEP_PROBE_PORTS.to_vec(),
            probe_timeout: SWEEP_PROBE_TIMEOUT,
            max_concurrent_probes: MAX_CONCURRENT_PROBES,
            stale_after_hours: STALE_DEVICE_THRESHOLD_HOURS,
        }
    }
}

impl DiscoveryConfig {
    pub fn with_discovery_interval_min(mut self, minutes: u64) -> Self {
        self.discovery_interval_min = minutes.max(MIN_DISCOVERY_INTERVAL_MIN);
        self
    }

    pub fn with_identification_interval_min(mut self, minutes: u64) -> Self {
        self.identification_interval_min = minutes.max(MIN_DISCOVERY_INTERVAL_MIN);
        self
    }

    pub fn with_router_discovery_interval_min(mut self, minutes: u64) -> Self {
        self.router_discovery_interval_min = minutes.max(MIN_DISCOVERY_INTERVAL_MIN);
        self
    }

    pub fn with_probe_ports(mut self, ports: Vec<u16>) -> Self {
        self.probe_ports = ports;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_stale_after_hours(mut self, hours: i64) -> Self {
        self.stale_after_hours = hours.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poller_config_clamps_interval_floor() {
        let cfg = PollerConfig::default().with_interval_ms(100);
        assert_eq!(cfg.interval_ms, MIN_POLL_INTERVAL_MS);

        let cfg = PollerConfig::default().with_interval_ms(60_000);
        assert_eq!(cfg.interval_ms, 60_000);
    }

    #[test]
    fn test_poller_config_clamps_concurrency_floor() {
        let cfg = PollerConfig::default().with_max_concurrent(0);
        assert_eq!(cfg.max_concurrent, MIN_MAX_CONCURRENT_POLLS);
    }

    #[test]
    fn test_discovery_config_clamps_cadence_floor() {
        let cfg = DiscoveryConfig::default().with_discovery_interval_min(0);
        assert_eq!(cfg.discovery_interval_min, MIN_DISCOVERY_INTERVAL_MIN);
    }
}
