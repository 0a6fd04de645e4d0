//! Command handlers for the CLI surface
//!
//! Each handler opens storage at the context's database path, runs one
//! operation against the engines and writes its report through the
//! context's output hook.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::alerts::{Alert, AlertCallback};
use crate::app::AppContext;
use crate::classify::ClassifierEngine;
use crate::client::{ClientError, CommandRecord, DeviceClient, DeviceClientFactory};
use crate::config::DiscoveryConfig;
use crate::discovery::DiscoveryEngine;
use crate::models::{Device, DiscoveredFilter};
use crate::storage::{SqliteStorage, Storage};
use crate::vendor::VendorResolver;

/// The CLI holds no device credentials, so it cannot open management
/// sessions. Commands that only read the store or probe the network never
/// ask for a client; anything that does gets an honest error.
struct NoClientFactory;

struct NoClient;

#[async_trait]
impl DeviceClient for NoClient {
    async fn connect(&self, _timeout: Duration) -> Result<(), ClientError> {
        Err(ClientError::ConnectFailed(
            "no management client configured".to_string(),
        ))
    }

    async fn execute_command(
        &self,
        _path: &str,
        _args: &[(&str, &str)],
    ) -> Result<Vec<CommandRecord>, ClientError> {
        Err(ClientError::ConnectFailed(
            "no management client configured".to_string(),
        ))
    }

    async fn disconnect(&self) {}
}

impl DeviceClientFactory for NoClientFactory {
    fn client_for(&self, _device: &Device) -> Arc<dyn DeviceClient> {
        Arc::new(NoClient)
    }
}

fn open_storage(context: &AppContext) -> Result<Arc<dyn Storage>> {
    let path = context.db_path().to_path_buf();
    let storage = SqliteStorage::new(path).with_context(|| {
        format!("Failed to open database at {}", context.db_path().display())
    })?;
    Ok(Arc::new(storage))
}

/// Alert sink that routes engine alerts to the context's output hook.
fn alert_printer(context: &AppContext) -> AlertCallback {
    let context = context.clone();
    Arc::new(move |alert: Alert| {
        context.emit_line(&format!("ALERT [{}] {}", alert.kind.as_str(), alert.message));
    })
}

fn discovery_engine(storage: Arc<dyn Storage>, context: &AppContext) -> Result<DiscoveryEngine> {
    let vendor = Arc::new(VendorResolver::new(Arc::clone(&storage))?);
    let classifier = Arc::new(ClassifierEngine::new(Arc::clone(&storage)));
    Ok(DiscoveryEngine::new(
        storage,
        vendor,
        classifier,
        Arc::new(NoClientFactory),
        alert_printer(context),
        DiscoveryConfig::default(),
    ))
}

pub(crate) async fn handle_status(context: &AppContext) -> Result<()> {
    let storage = open_storage(context)?;

    let devices = storage.list_devices().await?;
    let online = devices.iter().filter(|d| d.is_online).count();
    let discovered = storage.count_discovered().await?;
    let identified = storage
        .list_discovered_devices(&DiscoveredFilter {
            identified: Some(true),
            ..Default::default()
        })
        .await?
        .len();

    context.emit_line(&format!(
        "Managed devices:    {} ({} online)",
        devices.len(),
        online
    ));
    context.emit_line(&format!(
        "Discovered devices: {} ({} identified)",
        discovered, identified
    ));

    let recent = storage.list_discovery_log(5).await?;
    context.emit_line("");
    context.emit_line("Recent discovery activity:");
    if recent.is_empty() {
        context.emit_line("  (none recorded)");
    } else {
        for entry in recent {
            context.emit_line(&format!(
                "  {}  {:<9} {} at {}",
                entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                entry.method.as_str(),
                entry.mac,
                entry.ip
            ));
        }
    }
    Ok(())
}

pub(crate) async fn handle_scan(cidr: &str, context: &AppContext) -> Result<()> {
    let storage = open_storage(context)?;
    let engine = discovery_engine(storage, context)?;

    context.emit_line(&format!("Sweeping {}...", cidr));
    let found = engine.scan_subnet(cidr).await?;
    context.emit_line(&format!("Sweep finished: {} responsive hosts recorded", found));
    Ok(())
}

pub(crate) async fn handle_devices(
    identified: Option<bool>,
    vendor: Option<&str>,
    min_score: Option<u8>,
    context: &AppContext,
) -> Result<()> {
    let storage = open_storage(context)?;
    let filter = DiscoveredFilter {
        identified,
        vendor: vendor.map(str::to_string),
        min_score,
    };
    let devices = storage.list_discovered_devices(&filter).await?;

    if devices.is_empty() {
        context.emit_line("No discovered devices match.");
        return Ok(());
    }

    for device in &devices {
        context.emit_line(&format!(
            "{:<17}  {:<15}  {:<12} {:>3}  {}",
            device.mac,
            device.ip,
            device.role,
            device.identification_score,
            device.display_name()
        ));
    }
    context.emit_line(&format!("{} devices", devices.len()));
    Ok(())
}

pub(crate) async fn handle_identify(target: &str, context: &AppContext) -> Result<()> {
    let storage = open_storage(context)?;
    let classifier = ClassifierEngine::new(storage);

    let outcome = classifier.classify(target).await?;
    context.emit_line(&format!("Role:  {}", outcome.role));
    context.emit_line(&format!("Score: {}", outcome.score));
    if !outcome.trace.is_empty() {
        context.emit_line("Signature scores:");
        for (role, score) in &outcome.trace {
            context.emit_line(&format!("  {:<16} {:>3}", role, score));
        }
    }
    Ok(())
}

pub(crate) async fn handle_reclassify(context: &AppContext) -> Result<()> {
    let storage = open_storage(context)?;
    let classifier = ClassifierEngine::new(storage);

    let classified = classifier.reclassify_all().await?;
    context.emit_line(&format!("Reclassified {} devices", classified));
    Ok(())
}

pub(crate) async fn handle_update_vendors(context: &AppContext) -> Result<()> {
    let storage = open_storage(context)?;
    let resolver = VendorResolver::new(storage)?;

    let imported = resolver.update_database().await?;
    context.emit_line(&format!("Imported {} vendor prefixes", imported));
    Ok(())
}
