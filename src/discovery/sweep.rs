//! Active subnet sweep
//!
//! TCP connect probes across a CIDR range, bounded by a fixed-width
//! semaphore. A host counts as responsive when at least one probe port
//! accepts; silent hosts leave no trace at all.

use anyhow::Result;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};

use crate::net::expand_cidr;

/// A host that answered at least one probe
#[derive(Debug, Clone)]
pub(crate) struct SweepHit {
    pub ip: String,
    pub open_ports: Vec<u16>,
}

/// Probe one host's candidate ports sequentially.
async fn probe_host_ports(ip: Ipv4Addr, ports: &[u16], probe_timeout: Duration) -> Vec<u16> {
    let mut open_ports = Vec::new();

    for &port in ports {
        let addr = SocketAddr::new(IpAddr::V4(ip), port);
        if let Ok(Ok(_)) =
            tokio::time::timeout(probe_timeout, tokio::net::TcpStream::connect(addr)).await
        {
            open_ports.push(port);
        }
    }

    open_ports
}

/// Sweep a CIDR range. Invalid input is rejected before any probe is sent.
pub(crate) async fn sweep_subnet(
    cidr: &str,
    ports: &[u16],
    probe_timeout: Duration,
    max_concurrent: usize,
) -> Result<Vec<SweepHit>> {
    let hosts = expand_cidr(cidr)?;
    tracing::info!(
        "Sweeping {} ({} hosts, {} ports each)",
        cidr,
        hosts.len(),
        ports.len()
    );

    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let hits: Arc<Mutex<Vec<(Ipv4Addr, Vec<u16>)>>> = Arc::new(Mutex::new(Vec::new()));
    let ports: Arc<Vec<u16>> = Arc::new(ports.to_vec());

    let mut handles = Vec::with_capacity(hosts.len());
    for ip in hosts {
        let semaphore = Arc::clone(&semaphore);
        let hits = Arc::clone(&hits);
        let ports = Arc::clone(&ports);

        handles.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::warn!("Probe semaphore closed for {}: {}", ip, e);
                    return;
                }
            };

            let open_ports = probe_host_ports(ip, &ports, probe_timeout).await;
            if !open_ports.is_empty() {
                hits.lock().await.push((ip, open_ports));
            }
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::warn!("Probe task failed: {}", e);
        }
    }

    let mut hits = hits.lock().await.clone();
    hits.sort_by_key(|(ip, _)| *ip);

    tracing::info!("Sweep of {} found {} responsive hosts", cidr, hits.len());
    Ok(hits
        .into_iter()
        .map(|(ip, open_ports)| SweepHit {
            ip: ip.to_string(),
            open_ports,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_sweep_records_only_answering_hosts() {
        // Loopback /30: .1 gets a listener, .2 stays silent.
        let listener = TcpListener::bind("127.91.0.1:0").await.expect("bind loopback");
        let port = listener.local_addr().expect("local addr").port();

        let hits = sweep_subnet(
            "127.91.0.0/30",
            &[port],
            Duration::from_millis(500),
            16,
        )
        .await
        .expect("sweep");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ip, "127.91.0.1");
        assert_eq!(hits[0].open_ports, vec![port]);
    }

    #[tokio::test]
    async fn test_sweep_rejects_invalid_cidr() {
        let result = sweep_subnet("bogus", &[80], Duration::from_millis(100), 4).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_probe_host_reports_multiple_open_ports() {
        let first = TcpListener::bind("127.91.0.5:0").await.expect("bind");
        let second = TcpListener::bind("127.91.0.5:0").await.expect("bind");
        let ports = [
            first.local_addr().expect("addr").port(),
            second.local_addr().expect("addr").port(),
            1, // refused immediately on loopback
        ];

        let open = probe_host_ports(
            Ipv4Addr::new(127, 91, 0, 5),
            &ports,
            Duration::from_millis(500),
        )
        .await;

        assert_eq!(open, vec![ports[0], ports[1]]);
    }
}
