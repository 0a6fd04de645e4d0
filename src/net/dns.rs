//! Reverse DNS lookup for hostname enrichment

use dns_lookup::lookup_addr;
use std::net::IpAddr;
use std::time::Duration;

/// DNS lookup timeout (synchronous, so we use spawn_blocking)
const DNS_TIMEOUT: Duration = Duration::from_secs(2);

/// Perform a reverse DNS lookup for a single IP address.
pub fn reverse_lookup(ip: IpAddr) -> Option<String> {
    match lookup_addr(&ip) {
        Ok(hostname) => {
            // Don't return if hostname is just the IP address
            if hostname != ip.to_string() {
                Some(hostname)
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

/// Reverse-resolve a hostname off the async runtime with a timeout.
///
/// Best effort: resolution failures and timeouts both yield `None`.
pub async fn resolve_hostname(ip_str: &str) -> Option<String> {
    let ip: IpAddr = ip_str.parse().ok()?;

    let lookup = tokio::time::timeout(
        DNS_TIMEOUT,
        tokio::task::spawn_blocking(move || reverse_lookup(ip)),
    )
    .await;

    match lookup {
        Ok(Ok(hostname)) => hostname,
        Ok(Err(e)) => {
            tracing::warn!("DNS worker join failed for {}: {}", ip, e);
            None
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_reverse_lookup_localhost() {
        let result = reverse_lookup(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
        println!("Localhost reverse lookup: {:?}", result);
        // Usually returns "localhost" or similar
    }

    #[tokio::test]
    async fn test_resolve_hostname_rejects_garbage_ip() {
        assert_eq!(resolve_hostname("not-an-ip").await, None);
    }
}
