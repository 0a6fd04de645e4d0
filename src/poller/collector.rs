//! Device metrics collection
//!
//! One poll's worth of data from one device: system resource figures,
//! identity, per-interface counters scored for health, and wireless client
//! registrations where the device has the capability.

use std::time::Duration;

use crate::client::{ClientError, CommandRecord, DeviceClient};
use crate::health::{score_interface, InterfaceCounters, InterfaceHealth};
use crate::models::Device;

/// One interface's raw counters together with its scored health
#[derive(Debug, Clone)]
pub struct InterfaceReport {
    pub counters: InterfaceCounters,
    pub health: InterfaceHealth,
}

/// Capability flags detected by probing an unflagged device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedCapabilities {
    pub wireless: bool,
    pub ap_controller: bool,
}

/// Everything one successful poll learned about a device
#[derive(Debug, Clone, Default)]
pub struct DeviceMetrics {
    pub identity: Option<String>,
    pub board_name: Option<String>,
    pub version: Option<String>,
    pub uptime_seconds: Option<u64>,
    pub cpu_load_percent: Option<u64>,
    pub free_memory_bytes: Option<u64>,
    pub interfaces: Vec<InterfaceReport>,
    /// Registered wireless clients, None when the device has no radio
    pub wireless_clients: Option<usize>,
    /// Probe result for devices with no capability flags yet, None when the
    /// probe was skipped
    pub capabilities: Option<DetectedCapabilities>,
}

impl DeviceMetrics {
    /// Interfaces scoring below the moderate threshold.
    pub fn degraded_interfaces(&self) -> usize {
        self.interfaces.iter().filter(|r| r.health.score < 70).count()
    }
}

/// Run one full collection pass over a connected session. The session is
/// torn down before returning, on the error paths included.
pub(crate) async fn collect_metrics(
    client: &dyn DeviceClient,
    device: &Device,
    connect_timeout: Duration,
) -> Result<DeviceMetrics, ClientError> {
    client.connect(connect_timeout).await?;
    let result = gather(client, device).await;
    client.disconnect().await;
    result
}

async fn gather(client: &dyn DeviceClient, device: &Device) -> Result<DeviceMetrics, ClientError> {
    let mut metrics = DeviceMetrics::default();

    let resource = client.execute_command("/system/resource", &[]).await?;
    if let Some(record) = resource.first() {
        metrics.uptime_seconds = record.get("uptime").map(parse_uptime);
        metrics.cpu_load_percent = record.get("cpu-load").and_then(|v| v.trim().parse().ok());
        metrics.free_memory_bytes = record.get("free-memory").and_then(|v| v.trim().parse().ok());
        metrics.board_name = record.get("board-name").map(str::to_string);
        metrics.version = record.get("version").map(str::to_string);
    }

    let identity = client.execute_command("/system/identity", &[]).await?;
    metrics.identity = identity
        .first()
        .and_then(|r| r.get("name"))
        .map(str::to_string);

    let interfaces = client.execute_command("/interface", &[]).await?;
    metrics.interfaces = interfaces
        .iter()
        .map(|record| {
            let counters = interface_counters(record);
            let health = score_interface(&counters);
            InterfaceReport { counters, health }
        })
        .collect();

    if device.has_wireless || device.has_ap_controller {
        metrics.wireless_clients = count_registrations(client, device).await;
    } else {
        metrics.capabilities = Some(probe_capabilities(client).await);
    }

    Ok(metrics)
}

/// Probe for wireless and controller packages on a device that has never
/// reported capabilities. A path that errors means the package is absent;
/// probing never fails the poll.
async fn probe_capabilities(client: &dyn DeviceClient) -> DetectedCapabilities {
    DetectedCapabilities {
        wireless: client.execute_command("/interface/wireless", &[]).await.is_ok(),
        ap_controller: client.execute_command("/caps-man/interface", &[]).await.is_ok(),
    }
}

/// Count wireless registrations over whichever table the device carries.
/// A failed read degrades to None rather than failing the poll.
async fn count_registrations(client: &dyn DeviceClient, device: &Device) -> Option<usize> {
    let path = if device.has_ap_controller {
        "/caps-man/registration-table"
    } else {
        "/interface/wireless/registration-table"
    };
    match client.execute_command(path, &[]).await {
        Ok(records) => Some(records.len()),
        Err(e) => {
            tracing::debug!("Registration table read failed on {}: {}", device.name, e);
            None
        }
    }
}

fn interface_counters(record: &CommandRecord) -> InterfaceCounters {
    InterfaceCounters {
        name: record.get("name").unwrap_or("unnamed").to_string(),
        admin_down: record.get_bool("disabled"),
        oper_up: record.get_bool("running"),
        tx_errors: record.get_u64("tx-error"),
        rx_errors: record.get_u64("rx-error"),
        tx_drops: record.get_u64("tx-drop"),
        rx_drops: record.get_u64("rx-drop"),
        link_downs: record.get_u64("link-downs"),
    }
}

/// Parse uptime notation like "1w2d3h4m5s" into seconds. Unknown unit
/// letters are skipped.
pub(crate) fn parse_uptime(raw: &str) -> u64 {
    let mut total = 0u64;
    let mut digits = String::new();

    for c in raw.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value: u64 = digits.parse().unwrap_or(0);
        digits.clear();
        let unit = match c {
            'w' => 604_800,
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => 0,
        };
        total = total.saturating_add(value.saturating_mul(unit));
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct CannedClient {
        fail_path: Option<&'static str>,
        disconnected: AtomicBool,
    }

    impl CannedClient {
        fn new() -> Self {
            Self {
                fail_path: None,
                disconnected: AtomicBool::new(false),
            }
        }

        fn failing_on(path: &'static str) -> Self {
            Self {
                fail_path: Some(path),
                disconnected: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl DeviceClient for CannedClient {
        async fn connect(&self, _timeout: Duration) -> Result<(), ClientError> {
            Ok(())
        }

        async fn execute_command(
            &self,
            path: &str,
            _args: &[(&str, &str)],
        ) -> Result<Vec<CommandRecord>, ClientError> {
            if self.fail_path == Some(path) {
                return Err(ClientError::CommandFailed(path.to_string()));
            }
            match path {
                "/system/resource" => Ok(vec![CommandRecord::from_pairs(&[
                    ("uptime", "1d2h3m4s"),
                    ("cpu-load", "12"),
                    ("free-memory", "268435456"),
                    ("board-name", "RB4011iGS+"),
                    ("version", "7.15.2"),
                ])]),
                "/system/identity" => {
                    Ok(vec![CommandRecord::from_pairs(&[("name", "core-router")])])
                }
                "/interface" => Ok(vec![
                    CommandRecord::from_pairs(&[
                        ("name", "ether1"),
                        ("running", "true"),
                        ("disabled", "false"),
                        ("tx-error", "0"),
                        ("rx-error", "0"),
                    ]),
                    CommandRecord::from_pairs(&[
                        ("name", "ether2"),
                        ("running", "false"),
                        ("disabled", "false"),
                    ]),
                ]),
                "/interface/wireless" => {
                    Ok(vec![CommandRecord::from_pairs(&[("name", "wlan1")])])
                }
                "/interface/wireless/registration-table" => Ok(vec![
                    CommandRecord::from_pairs(&[("mac-address", "AA:BB:CC:00:00:01")]),
                    CommandRecord::from_pairs(&[("mac-address", "AA:BB:CC:00:00:02")]),
                ]),
                other => Err(ClientError::CommandFailed(other.to_string())),
            }
        }

        async fn disconnect(&self) {
            self.disconnected.store(true, Ordering::SeqCst);
        }
    }

    fn device(has_wireless: bool) -> Device {
        let mut device = Device::new("core-router", "10.0.0.1", "creds");
        device.has_wireless = has_wireless;
        device
    }

    #[tokio::test]
    async fn test_collect_gathers_resource_identity_and_interfaces() {
        let client = CannedClient::new();
        let metrics = collect_metrics(&client, &device(false), Duration::from_secs(1))
            .await
            .expect("collection succeeds");

        assert_eq!(metrics.identity.as_deref(), Some("core-router"));
        assert_eq!(metrics.board_name.as_deref(), Some("RB4011iGS+"));
        assert_eq!(metrics.uptime_seconds, Some(93_784));
        assert_eq!(metrics.cpu_load_percent, Some(12));
        assert_eq!(metrics.interfaces.len(), 2);
        assert_eq!(metrics.interfaces[0].health.score, 100);
        assert_eq!(metrics.interfaces[1].health.score, 0, "link down scores zero");
        assert_eq!(metrics.degraded_interfaces(), 1);
        assert_eq!(metrics.wireless_clients, None, "no radio, no registration query");
        assert_eq!(
            metrics.capabilities,
            Some(DetectedCapabilities { wireless: true, ap_controller: false }),
            "an unflagged device gets probed"
        );
        assert!(client.disconnected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_collect_counts_wireless_registrations() {
        let client = CannedClient::new();
        let metrics = collect_metrics(&client, &device(true), Duration::from_secs(1))
            .await
            .expect("collection succeeds");
        assert_eq!(metrics.wireless_clients, Some(2));
        assert_eq!(metrics.capabilities, None, "flagged devices are not re-probed");
    }

    #[tokio::test]
    async fn test_failed_command_still_disconnects() {
        let client = CannedClient::failing_on("/interface");
        let result = collect_metrics(&client, &device(false), Duration::from_secs(1)).await;
        assert!(result.is_err());
        assert!(client.disconnected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_registration_failure_degrades_to_none() {
        let client = CannedClient::failing_on("/interface/wireless/registration-table");
        let metrics = collect_metrics(&client, &device(true), Duration::from_secs(1))
            .await
            .expect("poll survives a registration read failure");
        assert_eq!(metrics.wireless_clients, None);
    }

    #[test]
    fn test_parse_uptime_notation() {
        assert_eq!(parse_uptime("45s"), 45);
        assert_eq!(parse_uptime("2m10s"), 130);
        assert_eq!(parse_uptime("1d2h3m4s"), 93_784);
        assert_eq!(parse_uptime("1w"), 604_800);
        assert_eq!(parse_uptime(""), 0);
        assert_eq!(parse_uptime("worm"), 0);
    }
}
