//! CIDR parsing and host expansion for subnet sweeps

use anyhow::{Context, Result};
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;

use crate::config::MAX_SWEEP_HOSTS;

/// Checks if an IP address is a network or broadcast address
pub fn is_special_address(ip: Ipv4Addr, subnet: &Ipv4Network) -> bool {
    ip == subnet.network() || ip == subnet.broadcast()
}

/// Parse a CIDR string and expand it into scannable host addresses.
///
/// Network and broadcast addresses are excluded. Oversized ranges are
/// truncated to MAX_SWEEP_HOSTS with a warning rather than rejected, so an
/// accidental `/8` cannot stall the engine.
pub fn expand_cidr(cidr: &str) -> Result<Vec<Ipv4Addr>> {
    let subnet: Ipv4Network = cidr
        .parse()
        .with_context(|| format!("Invalid CIDR '{}'", cidr))?;

    let hosts: Vec<Ipv4Addr> = subnet
        .iter()
        .filter(|ip| !is_special_address(*ip, &subnet))
        .take(MAX_SWEEP_HOSTS)
        .collect();

    if (subnet.size() as usize) > hosts.len() + 2 {
        tracing::warn!(
            "Subnet {} has {} addresses, limiting sweep to {} hosts",
            subnet,
            subnet.size(),
            hosts.len()
        );
    }

    Ok(hosts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_cidr_slash_30_has_two_hosts() {
        let hosts = expand_cidr("192.168.1.0/30").expect("valid cidr");
        assert_eq!(
            hosts,
            vec![Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(192, 168, 1, 2)]
        );
    }

    #[test]
    fn test_expand_cidr_slash_24_excludes_network_and_broadcast() {
        let hosts = expand_cidr("10.0.0.0/24").expect("valid cidr");
        assert_eq!(hosts.len(), 254);
        assert!(!hosts.contains(&Ipv4Addr::new(10, 0, 0, 0)));
        assert!(!hosts.contains(&Ipv4Addr::new(10, 0, 0, 255)));
    }

    #[test]
    fn test_expand_cidr_rejects_malformed() {
        assert!(expand_cidr("not-a-cidr").is_err());
        assert!(expand_cidr("10.0.0.0/33").is_err());
        assert!(expand_cidr("").is_err());
    }

    #[test]
    fn test_expand_cidr_caps_huge_ranges() {
        let hosts = expand_cidr("10.0.0.0/16").expect("valid cidr");
        assert_eq!(hosts.len(), MAX_SWEEP_HOSTS);
    }
}
