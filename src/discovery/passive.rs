//! Passive discovery sources
//!
//! Reads the address-resolution and DHCP lease tables a managed device
//! already maintains. Nothing on the network is probed directly; the
//! managed device did the observing for us.

use serde_json::json;

use crate::client::{ClientError, CommandRecord, DeviceClient};
use crate::models::DetectionMethod;

/// One device sighting extracted from a managed device's tables
#[derive(Debug, Clone)]
pub(crate) struct PassiveSighting {
    pub ip: String,
    pub mac: String,
    pub method: DetectionMethod,
    pub extra: serde_json::Value,
}

/// Pull the ARP table. Incomplete entries (no MAC yet) are skipped.
pub(crate) async fn harvest_arp_table(
    client: &dyn DeviceClient,
) -> Result<Vec<PassiveSighting>, ClientError> {
    let records = client.execute_command("/ip/arp", &[]).await?;
    Ok(records.iter().filter_map(arp_sighting).collect())
}

/// Pull the DHCP lease table. The leased hostname travels along as extra
/// evidence.
pub(crate) async fn harvest_dhcp_leases(
    client: &dyn DeviceClient,
) -> Result<Vec<PassiveSighting>, ClientError> {
    let records = client.execute_command("/ip/dhcp-server/lease", &[]).await?;
    Ok(records.iter().filter_map(dhcp_sighting).collect())
}

fn arp_sighting(record: &CommandRecord) -> Option<PassiveSighting> {
    let ip = non_empty(record.get("address"))?;
    let mac = non_empty(record.get("mac-address"))?;

    let mut extra = json!({});
    if let Some(interface) = non_empty(record.get("interface")) {
        extra["interface"] = json!(interface);
    }

    Some(PassiveSighting {
        ip: ip.to_string(),
        mac: mac.to_string(),
        method: DetectionMethod::Arp,
        extra,
    })
}

fn dhcp_sighting(record: &CommandRecord) -> Option<PassiveSighting> {
    let ip = non_empty(record.get("address"))?;
    let mac = non_empty(record.get("mac-address"))?;

    let mut extra = json!({});
    if let Some(hostname) = non_empty(record.get("host-name")) {
        extra["hostname"] = json!(hostname);
    }

    Some(PassiveSighting {
        ip: ip.to_string(),
        mac: mac.to_string(),
        method: DetectionMethod::Dhcp,
        extra,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
