//! Discovery engine
//!
//! Owns the single write path for device sightings and the background
//! cadences that feed it: passive table harvests from managed devices, the
//! staleness sweep, and the identification pass. Active subnet sweeps
//! funnel through the same write path on demand.

use anyhow::{anyhow, Result};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::passive::{harvest_arp_table, harvest_dhcp_leases, PassiveSighting};
use super::sweep::sweep_subnet;
use crate::alerts::{Alert, AlertCallback, AlertKind};
use crate::classify::{Classification, ClassifierEngine};
use crate::client::DeviceClientFactory;
use crate::config::{DiscoveryConfig, CONNECT_TIMEOUT};
use crate::models::{DetectionMethod, DiscoveredDevice, DiscoveryEvent};
use crate::net::{is_sentinel_mac, normalize_mac, resolve_hostname, sentinel_mac};
use crate::storage::Storage;
use crate::vendor::VendorResolver;

/// Evidence weight for a known vendor on a fresh sighting
const VENDOR_EVIDENCE: u8 = 20;
/// Evidence weight for a known hostname on a fresh sighting
const HOSTNAME_EVIDENCE: u8 = 30;

/// Ingests device sightings and runs the discovery background loops
pub struct DiscoveryEngine {
    storage: Arc<dyn Storage>,
    vendor: Arc<VendorResolver>,
    classifier: Arc<ClassifierEngine>,
    clients: Arc<dyn DeviceClientFactory>,
    alerts: AlertCallback,
    config: DiscoveryConfig,
    /// Serializes the lookup-merge-upsert section so concurrent sightings
    /// of the same hardware address cannot interleave
    merge_lock: Arc<Mutex<()>>,
    is_running: Arc<AtomicBool>,
}

impl Clone for DiscoveryEngine {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            vendor: Arc::clone(&self.vendor),
            classifier: Arc::clone(&self.classifier),
            clients: Arc::clone(&self.clients),
            alerts: Arc::clone(&self.alerts),
            config: self.config.clone(),
            merge_lock: Arc::clone(&self.merge_lock),
            is_running: Arc::clone(&self.is_running),
        }
    }
}

impl DiscoveryEngine {
    pub fn new(
        storage: Arc<dyn Storage>,
        vendor: Arc<VendorResolver>,
        classifier: Arc<ClassifierEngine>,
        clients: Arc<dyn DeviceClientFactory>,
        alerts: AlertCallback,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            storage,
            vendor,
            classifier,
            clients,
            alerts,
            config,
            merge_lock: Arc::new(Mutex::new(())),
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register one device sighting. This is the only path that writes
    /// discovered devices; passive harvests, sweeps and manual registration
    /// all funnel through it.
    ///
    /// Sightings without a MAC are keyed by an `unknown_<ip>` sentinel until
    /// a MAC-bearing sighting merges into the record. Every accepted call
    /// appends exactly one discovery log entry, re-sightings included.
    pub async fn detect_device(
        &self,
        ip: &str,
        mac: Option<&str>,
        method: DetectionMethod,
        source_device_id: Option<i64>,
        extra: serde_json::Value,
    ) -> Result<DiscoveredDevice> {
        let mac_key = match mac {
            Some(raw) => normalize_mac(raw).ok_or_else(|| {
                tracing::warn!("Rejecting sighting of {}: malformed hardware address '{}'", ip, raw);
                anyhow!("Malformed hardware address '{}'", raw)
            })?,
            None => sentinel_mac(ip),
        };

        let _guard = self.merge_lock.lock().await;

        let existing = self
            .storage
            .get_discovered_by_mac_or_ip(Some(&mac_key), Some(ip))
            .await?;

        let device = match existing {
            Some(found) if same_hardware(&found.mac, &mac_key) => {
                self.merge_sighting(found, &mac_key, ip, &extra).await?
            }
            // An IP match with a conflicting real MAC is a different device
            // that took over the address.
            _ => self.create_sighting(&mac_key, ip, &extra).await?,
        };

        let event = DiscoveryEvent {
            mac: device.mac.clone(),
            ip: ip.to_string(),
            method,
            source_device_id,
            detail: extra,
        };
        self.storage.append_discovery_log(&event).await?;

        Ok(device)
    }

    async fn merge_sighting(
        &self,
        mut device: DiscoveredDevice,
        mac_key: &str,
        ip: &str,
        extra: &serde_json::Value,
    ) -> Result<DiscoveredDevice> {
        if is_sentinel_mac(&device.mac) && !is_sentinel_mac(mac_key) {
            tracing::debug!("Sighting upgraded {} to {}", device.mac, mac_key);
            device.mac = mac_key.to_string();
        }
        if device.ip != ip {
            tracing::debug!("{} moved from {} to {}", device.mac, device.ip, ip);
            device.ip = ip.to_string();
        }

        device.merge_metadata(extra);
        self.enrich(&mut device, extra).await;
        device.absorb_score(sighting_score(&device));
        device.last_seen = Utc::now();
        device.is_online = true;

        self.storage.upsert_discovered_device(&device).await
    }

    async fn create_sighting(
        &self,
        mac_key: &str,
        ip: &str,
        extra: &serde_json::Value,
    ) -> Result<DiscoveredDevice> {
        let mut device = DiscoveredDevice::new(mac_key, ip);
        device.merge_metadata(extra);
        self.enrich(&mut device, extra).await;
        device.absorb_score(sighting_score(&device));

        let stored = self.storage.upsert_discovered_device(&device).await?;
        tracing::info!("New device discovered: {} at {}", stored.display_name(), ip);
        (self.alerts)(
            Alert::new(
                AlertKind::NewDeviceDiscovered,
                format!("New device discovered: {} ({})", stored.display_name(), ip),
            )
            .with_device(stored.display_name()),
        );
        Ok(stored)
    }

    /// Best-effort hostname and vendor enrichment. A lookup miss is a valid
    /// terminal state, never an error, and never blocks the merge.
    async fn enrich(&self, device: &mut DiscoveredDevice, extra: &serde_json::Value) {
        if field_is_empty(&device.hostname) {
            let provided = extra
                .get("hostname")
                .and_then(|v| v.as_str())
                .filter(|h| !h.is_empty());
            device.hostname = match provided {
                Some(hostname) => Some(hostname.to_string()),
                None => resolve_hostname(&device.ip).await,
            };
        }
        if field_is_empty(&device.vendor) && !is_sentinel_mac(&device.mac) {
            device.vendor = self.vendor.lookup(&device.mac).await;
        }
    }

    /// Read the ARP and DHCP tables of every managed device and feed each
    /// complete entry through `detect_device`. A failing managed device is
    /// skipped; the harvest continues. Returns the number of sightings.
    pub async fn harvest_managed_devices(&self) -> Result<usize> {
        let devices = self.storage.list_devices().await?;
        let mut total = 0;

        for device in devices {
            let client = self.clients.client_for(&device);
            if let Err(e) = client.connect(CONNECT_TIMEOUT).await {
                tracing::warn!("Passive harvest skipping {}: {}", device.name, e);
                continue;
            }

            let mut sightings: Vec<PassiveSighting> = Vec::new();
            match harvest_arp_table(client.as_ref()).await {
                Ok(found) => sightings.extend(found),
                Err(e) => tracing::warn!("ARP table read failed on {}: {}", device.name, e),
            }
            match harvest_dhcp_leases(client.as_ref()).await {
                Ok(found) => sightings.extend(found),
                Err(e) => tracing::warn!("DHCP lease read failed on {}: {}", device.name, e),
            }
            client.disconnect().await;

            for sighting in sightings {
                let PassiveSighting { ip, mac, method, extra } = sighting;
                match self
                    .detect_device(&ip, Some(&mac), method, Some(device.id), extra)
                    .await
                {
                    Ok(_) => total += 1,
                    Err(e) => tracing::warn!("Sighting from {} rejected: {}", device.name, e),
                }
            }
        }

        Ok(total)
    }

    /// Actively sweep a subnet. Responsive hosts register through the
    /// standard detection path; silent hosts leave no trace. Returns how
    /// many hosts answered.
    pub async fn scan_subnet(&self, cidr: &str) -> Result<usize> {
        let hits = sweep_subnet(
            cidr,
            &self.config.probe_ports,
            self.config.probe_timeout,
            self.config.max_concurrent_probes,
        )
        .await?;
        let responsive = hits.len();

        for hit in hits {
            if let Err(e) = self
                .detect_device(
                    &hit.ip,
                    None,
                    DetectionMethod::PortScan,
                    None,
                    json!({"open_ports": hit.open_ports}),
                )
                .await
            {
                tracing::warn!("Failed to record sweep hit {}: {}", hit.ip, e);
            }
        }

        Ok(responsive)
    }

    /// Mark devices unseen past the staleness window offline. Stale devices
    /// are kept, never deleted.
    pub async fn mark_stale_devices(&self) -> Result<usize> {
        let threshold = Utc::now() - ChronoDuration::hours(self.config.stale_after_hours);
        let devices = self
            .storage
            .list_discovered_devices(&Default::default())
            .await?;

        let mut marked = 0;
        for mut device in devices {
            if !device.is_online || device.last_seen >= threshold {
                continue;
            }
            device.is_online = false;
            match self.storage.upsert_discovered_device(&device).await {
                Ok(_) => {
                    (self.alerts)(
                        Alert::new(
                            AlertKind::DeviceWentStale,
                            format!(
                                "Device {} not seen since {}",
                                device.display_name(),
                                device.last_seen.to_rfc3339()
                            ),
                        )
                        .with_device(device.display_name()),
                    );
                    marked += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to mark {} stale: {}", device.mac, e);
                }
            }
        }

        if marked > 0 {
            tracing::info!("Marked {} stale devices offline", marked);
        }
        Ok(marked)
    }

    /// Run one harvest plus staleness pass immediately, outside the cadence.
    pub async fn run_discovery_now(&self) -> Result<usize> {
        let sightings = self.harvest_managed_devices().await?;
        self.mark_stale_devices().await?;
        Ok(sightings)
    }

    /// Re-classify one device immediately.
    pub async fn identify_now(&self, target: &str) -> Result<Classification> {
        self.classifier.classify(target).await
    }

    /// Start the discovery and identification loops. Idempotent.
    pub fn start(&self) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            tracing::debug!("Discovery loops already running");
            return;
        }

        let engine = self.clone();
        tokio::spawn(async move {
            let discovery_secs = engine.config.discovery_interval_min * 60;
            let harvest_secs = engine.config.router_discovery_interval_min * 60;
            // Wake at the finer of the two cadences and check what is due.
            let wake_secs = discovery_secs.min(harvest_secs);

            tracing::info!(
                "Discovery loop started (sweep every {} min, harvest every {} min)",
                engine.config.discovery_interval_min,
                engine.config.router_discovery_interval_min
            );

            let mut last_harvest: Option<Instant> = None;
            let mut last_sweep: Option<Instant> = None;

            while engine.is_running.load(Ordering::SeqCst) {
                if is_due(last_harvest, harvest_secs) {
                    if let Err(e) = engine.harvest_managed_devices().await {
                        tracing::warn!("Passive harvest failed: {}", e);
                    }
                    last_harvest = Some(Instant::now());
                }
                if is_due(last_sweep, discovery_secs) {
                    if let Err(e) = engine.mark_stale_devices().await {
                        tracing::warn!("Staleness sweep failed: {}", e);
                    }
                    last_sweep = Some(Instant::now());
                }

                for _ in 0..wake_secs {
                    if !engine.is_running.load(Ordering::SeqCst) {
                        break;
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }

            tracing::info!("Discovery loop stopped");
        });

        let engine = self.clone();
        tokio::spawn(async move {
            tracing::info!(
                "Identification loop started (every {} min)",
                engine.config.identification_interval_min
            );

            while engine.is_running.load(Ordering::SeqCst) {
                match engine.classifier.reclassify_all().await {
                    Ok(count) => {
                        tracing::debug!("Identification pass classified {} devices", count)
                    }
                    Err(e) => tracing::warn!("Identification pass failed: {}", e),
                }

                for _ in 0..engine.config.identification_interval_min * 60 {
                    if !engine.is_running.load(Ordering::SeqCst) {
                        break;
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }

            tracing::info!("Identification loop stopped");
        });
    }

    /// Signal the loops to end. In-progress passes finish on their own.
    pub fn stop(&self) {
        self.is_running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}

/// A stored record and a sighting refer to the same hardware when the keys
/// match or either side only knows the IP-derived sentinel.
fn same_hardware(stored: &str, sighting: &str) -> bool {
    stored == sighting || is_sentinel_mac(stored) || is_sentinel_mac(sighting)
}

fn is_due(last: Option<Instant>, period_secs: u64) -> bool {
    last.map_or(true, |t| t.elapsed() >= Duration::from_secs(period_secs))
}

fn field_is_empty(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, |s| s.is_empty())
}

/// Evidence score of the record as it stands after enrichment.
fn sighting_score(device: &DiscoveredDevice) -> u8 {
    let mut score = 0;
    if !field_is_empty(&device.vendor) {
        score += VENDOR_EVIDENCE;
    }
    if !field_is_empty(&device.hostname) {
        score += HOSTNAME_EVIDENCE;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientError, CommandRecord, DeviceClient};
    use crate::models::Device;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct ScriptedClient {
        fail_connect: bool,
        arp: Vec<CommandRecord>,
        dhcp: Vec<CommandRecord>,
    }

    #[async_trait]
    impl DeviceClient for ScriptedClient {
        async fn connect(&self, _timeout: Duration) -> Result<(), ClientError> {
            if self.fail_connect {
                Err(ClientError::ConnectFailed("no route to host".to_string()))
            } else {
                Ok(())
            }
        }

        async fn execute_command(
            &self,
            path: &str,
            _args: &[(&str, &str)],
        ) -> Result<Vec<CommandRecord>, ClientError> {
            match path {
                "/ip/arp" => Ok(self.arp.clone()),
                "/ip/dhcp-server/lease" => Ok(self.dhcp.clone()),
                other => Err(ClientError::CommandFailed(other.to_string())),
            }
        }

        async fn disconnect(&self) {}
    }

    struct ScriptedFactory {
        failing_hosts: Vec<String>,
        arp: Vec<CommandRecord>,
        dhcp: Vec<CommandRecord>,
    }

    impl ScriptedFactory {
        fn empty() -> Self {
            Self {
                failing_hosts: Vec::new(),
                arp: Vec::new(),
                dhcp: Vec::new(),
            }
        }
    }

    impl DeviceClientFactory for ScriptedFactory {
        fn client_for(&self, device: &Device) -> Arc<dyn DeviceClient> {
            Arc::new(ScriptedClient {
                fail_connect: self.failing_hosts.contains(&device.host),
                arp: self.arp.clone(),
                dhcp: self.dhcp.clone(),
            })
        }
    }

    type AlertSink = Arc<StdMutex<Vec<Alert>>>;

    fn engine_with(storage: Arc<MemoryStorage>, factory: ScriptedFactory) -> (DiscoveryEngine, AlertSink) {
        let storage: Arc<dyn Storage> = storage;
        let sink: AlertSink = Arc::new(StdMutex::new(Vec::new()));
        let sink_clone = Arc::clone(&sink);
        let alerts: AlertCallback = Arc::new(move |alert| {
            sink_clone.lock().expect("alert sink poisoned").push(alert);
        });

        let vendor = Arc::new(
            VendorResolver::new(Arc::clone(&storage))
                .expect("client build")
                .with_api_url("http://127.0.0.1:9/{mac}"),
        );
        let classifier = Arc::new(ClassifierEngine::new(Arc::clone(&storage)));
        let engine = DiscoveryEngine::new(
            storage,
            vendor,
            classifier,
            Arc::new(factory),
            alerts,
            DiscoveryConfig::default(),
        );
        (engine, sink)
    }

    #[tokio::test]
    async fn test_detect_device_is_idempotent() {
        let storage = Arc::new(MemoryStorage::new());
        let (engine, _alerts) = engine_with(Arc::clone(&storage), ScriptedFactory::empty());

        let extra = json!({"interface": "bridge"});
        engine
            .detect_device("192.0.2.10", Some("AA:BB:CC:00:11:22"), DetectionMethod::Arp, Some(1), extra.clone())
            .await
            .unwrap();
        engine
            .detect_device("192.0.2.10", Some("AA:BB:CC:00:11:22"), DetectionMethod::Arp, Some(1), extra)
            .await
            .unwrap();

        assert_eq!(storage.count_discovered().await.unwrap(), 1);
        let log = storage.list_discovery_log(10).await.unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|e| e.method == DetectionMethod::Arp));
    }

    #[tokio::test]
    async fn test_detect_device_rejects_malformed_mac() {
        let storage = Arc::new(MemoryStorage::new());
        let (engine, _alerts) = engine_with(Arc::clone(&storage), ScriptedFactory::empty());

        let result = engine
            .detect_device("192.0.2.10", Some("zz:zz:zz"), DetectionMethod::Arp, None, json!({}))
            .await;
        assert!(result.is_err());
        assert_eq!(storage.count_discovered().await.unwrap(), 0);
        assert!(storage.list_discovery_log(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sentinel_record_upgrades_in_place() {
        let storage = Arc::new(MemoryStorage::new());
        let (engine, _alerts) = engine_with(Arc::clone(&storage), ScriptedFactory::empty());

        let first = engine
            .detect_device("192.0.2.31", None, DetectionMethod::PortScan, None, json!({"open_ports": [80]}))
            .await
            .unwrap();
        assert_eq!(first.mac, "unknown_192.0.2.31");

        let second = engine
            .detect_device(
                "192.0.2.31",
                Some("AA:BB:CC:00:22:33"),
                DetectionMethod::Arp,
                Some(1),
                json!({}),
            )
            .await
            .unwrap();

        assert_eq!(second.id, first.id, "sentinel upgrade must keep the record");
        assert_eq!(second.mac, "aa:bb:cc:00:22:33");
        assert_eq!(second.metadata["open_ports"], json!([80]), "evidence survives the upgrade");
        assert_eq!(storage.count_discovered().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_conflicting_real_macs_create_separate_records() {
        let storage = Arc::new(MemoryStorage::new());
        let (engine, _alerts) = engine_with(Arc::clone(&storage), ScriptedFactory::empty());

        engine
            .detect_device("192.0.2.40", Some("AA:BB:CC:00:00:01"), DetectionMethod::Arp, None, json!({}))
            .await
            .unwrap();
        engine
            .detect_device("192.0.2.40", Some("AA:BB:CC:00:00:02"), DetectionMethod::Arp, None, json!({}))
            .await
            .unwrap();

        assert_eq!(storage.count_discovered().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_ip_change_merges_into_existing_record() {
        let storage = Arc::new(MemoryStorage::new());
        let (engine, _alerts) = engine_with(Arc::clone(&storage), ScriptedFactory::empty());

        engine
            .detect_device("192.0.2.50", Some("AA:BB:CC:00:33:44"), DetectionMethod::Dhcp, None, json!({"hostname": "laptop-9"}))
            .await
            .unwrap();
        let moved = engine
            .detect_device("192.0.2.51", Some("AA:BB:CC:00:33:44"), DetectionMethod::Dhcp, None, json!({}))
            .await
            .unwrap();

        assert_eq!(moved.ip, "192.0.2.51");
        assert_eq!(moved.hostname.as_deref(), Some("laptop-9"));
        assert_eq!(storage.count_discovered().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_score_never_decreases_on_weaker_sighting() {
        let storage = Arc::new(MemoryStorage::new());
        let (engine, _alerts) = engine_with(Arc::clone(&storage), ScriptedFactory::empty());

        let first = engine
            .detect_device(
                "192.0.2.60",
                Some("AA:BB:CC:00:55:66"),
                DetectionMethod::Dhcp,
                None,
                json!({"hostname": "camera-2"}),
            )
            .await
            .unwrap();
        assert!(first.identification_score >= HOSTNAME_EVIDENCE);

        let second = engine
            .detect_device("192.0.2.60", Some("AA:BB:CC:00:55:66"), DetectionMethod::Arp, None, json!({}))
            .await
            .unwrap();
        assert!(
            second.identification_score >= first.identification_score,
            "score regressed from {} to {}",
            first.identification_score,
            second.identification_score
        );
    }

    #[tokio::test]
    async fn test_new_device_alert_fires_once() {
        let storage = Arc::new(MemoryStorage::new());
        let (engine, alerts) = engine_with(Arc::clone(&storage), ScriptedFactory::empty());

        for _ in 0..2 {
            engine
                .detect_device("192.0.2.70", Some("AA:BB:CC:00:77:88"), DetectionMethod::Arp, None, json!({}))
                .await
                .unwrap();
        }

        let fired = alerts.lock().expect("alert sink poisoned");
        let new_device_alerts = fired
            .iter()
            .filter(|a| a.kind == AlertKind::NewDeviceDiscovered)
            .count();
        assert_eq!(new_device_alerts, 1);
    }

    #[tokio::test]
    async fn test_mark_stale_devices_keeps_records() {
        let storage = Arc::new(MemoryStorage::new());
        let (engine, alerts) = engine_with(Arc::clone(&storage), ScriptedFactory::empty());

        let mut stale = DiscoveredDevice::new("aa:bb:cc:00:99:aa", "192.0.2.80");
        stale.last_seen = Utc::now() - ChronoDuration::hours(25);
        storage.upsert_discovered_device(&stale).await.unwrap();

        let fresh = DiscoveredDevice::new("aa:bb:cc:00:99:bb", "192.0.2.81");
        storage.upsert_discovered_device(&fresh).await.unwrap();

        let marked = engine.mark_stale_devices().await.unwrap();
        assert_eq!(marked, 1);
        assert_eq!(storage.count_discovered().await.unwrap(), 2, "stale devices are never deleted");

        let stored = storage
            .get_discovered_by_mac_or_ip(Some("aa:bb:cc:00:99:aa"), None)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_online);

        let stale_alerts = alerts
            .lock()
            .expect("alert sink poisoned")
            .iter()
            .filter(|a| a.kind == AlertKind::DeviceWentStale)
            .count();
        assert_eq!(stale_alerts, 1);
    }

    #[tokio::test]
    async fn test_harvest_continues_past_failing_device() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .upsert_device(&Device::new("edge-1", "10.0.0.1", "creds-1"))
            .await
            .unwrap();
        let good = storage
            .upsert_device(&Device::new("edge-2", "10.0.0.2", "creds-2"))
            .await
            .unwrap();

        let factory = ScriptedFactory {
            failing_hosts: vec!["10.0.0.1".to_string()],
            arp: vec![CommandRecord::from_pairs(&[
                ("address", "192.0.2.90"),
                ("mac-address", "AA:BB:CC:11:22:33"),
                ("interface", "bridge"),
            ])],
            dhcp: Vec::new(),
        };
        let (engine, _alerts) = engine_with(Arc::clone(&storage), factory);

        let sightings = engine.harvest_managed_devices().await.unwrap();
        assert_eq!(sightings, 1);

        let log = storage.list_discovery_log(10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].source_device_id, Some(good.id));
    }

    #[tokio::test]
    async fn test_scan_subnet_records_only_responders() {
        // Loopback /30: .1 listens on an ephemeral port, .2 answers nothing.
        let listener = tokio::net::TcpListener::bind("127.92.0.1:0")
            .await
            .expect("bind loopback");
        let port = listener.local_addr().expect("local addr").port();

        let storage = Arc::new(MemoryStorage::new());
        let (mut engine, _alerts) = engine_with(Arc::clone(&storage), ScriptedFactory::empty());
        engine.config = DiscoveryConfig::default().with_probe_ports(vec![port]);

        let responsive = engine.scan_subnet("127.92.0.0/30").await.unwrap();
        assert_eq!(responsive, 1);
        assert_eq!(storage.count_discovered().await.unwrap(), 1);

        let device = storage
            .get_discovered_by_mac_or_ip(None, Some("127.92.0.1"))
            .await
            .unwrap()
            .expect("responder recorded");
        assert_eq!(device.mac, "unknown_127.92.0.1");
        assert_eq!(device.metadata["open_ports"], json!([port]));

        let log = storage.list_discovery_log(10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].method, DetectionMethod::PortScan);
    }

    #[tokio::test]
    async fn test_scan_subnet_rejects_invalid_range() {
        let storage = Arc::new(MemoryStorage::new());
        let (engine, _alerts) = engine_with(storage, ScriptedFactory::empty());
        assert!(engine.scan_subnet("not-a-range").await.is_err());
    }
}
