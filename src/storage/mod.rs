//! Persistence layer
//!
//! The engine talks to storage exclusively through the [`Storage`] trait.
//! `SqliteStorage` is the production implementation; `MemoryStorage` backs
//! tests with identical observable semantics.

pub mod memory;
pub mod schema;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Device, DiscoveredDevice, DiscoveredFilter, DiscoveryEvent, DiscoveryLogEntry};

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// A persisted vendor-cache row. `vendor = None` is a cached negative.
#[derive(Debug, Clone)]
pub struct VendorCacheEntry {
    pub prefix: String,
    pub vendor: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Persistence operations consumed by the engine
#[async_trait]
pub trait Storage: Send + Sync {
    async fn list_devices(&self) -> Result<Vec<Device>>;
    async fn get_device(&self, id: i64) -> Result<Option<Device>>;
    /// Insert (`id == 0`, matching by host first) or update a managed device.
    /// Returns the stored row.
    async fn upsert_device(&self, device: &Device) -> Result<Device>;

    async fn list_discovered_devices(
        &self,
        filter: &DiscoveredFilter,
    ) -> Result<Vec<DiscoveredDevice>>;
    /// Look up a discovered device by hardware address or IP; a MAC match
    /// wins over an IP match.
    async fn get_discovered_by_mac_or_ip(
        &self,
        mac: Option<&str>,
        ip: Option<&str>,
    ) -> Result<Option<DiscoveredDevice>>;
    /// Insert or update a discovered device. An existing `id` updates that
    /// row (allowing sentinel MAC keys to be rewritten); `id == 0` matches by
    /// MAC before inserting. Returns the stored row.
    async fn upsert_discovered_device(&self, device: &DiscoveredDevice) -> Result<DiscoveredDevice>;
    async fn count_discovered(&self) -> Result<usize>;

    /// Append one audit row; returns its id.
    async fn append_discovery_log(&self, event: &DiscoveryEvent) -> Result<i64>;
    /// Most recent audit rows, newest first.
    async fn list_discovery_log(&self, limit: usize) -> Result<Vec<DiscoveryLogEntry>>;

    async fn get_vendor_cache_entry(&self, prefix: &str) -> Result<Option<VendorCacheEntry>>;
    async fn upsert_vendor_cache_entry(&self, prefix: &str, vendor: Option<&str>) -> Result<()>;
    /// Bulk import of `(prefix, vendor)` pairs in batched transactions.
    /// Returns the number of rows written.
    async fn bulk_upsert_vendor_cache(&self, entries: &[(String, String)]) -> Result<usize>;
}
