//! In-memory storage fake
//!
//! Mirrors the observable semantics of the SQLite implementation so tests
//! can exercise the engines without touching disk.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{Storage, VendorCacheEntry};
use crate::models::{Device, DiscoveredDevice, DiscoveredFilter, DiscoveryEvent, DiscoveryLogEntry};

#[derive(Default)]
struct Inner {
    devices: Vec<Device>,
    discovered: Vec<DiscoveredDevice>,
    log: Vec<DiscoveryLogEntry>,
    vendor_cache: HashMap<String, VendorCacheEntry>,
    next_device_id: i64,
    next_discovered_id: i64,
    next_log_id: i64,
}

/// HashMap-backed storage for tests
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| anyhow!("Storage lock poisoned"))
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn list_devices(&self) -> Result<Vec<Device>> {
        let inner = self.lock()?;
        let mut devices = inner.devices.clone();
        devices.sort_by_key(|d| d.id);
        Ok(devices)
    }

    async fn get_device(&self, id: i64) -> Result<Option<Device>> {
        let inner = self.lock()?;
        Ok(inner.devices.iter().find(|d| d.id == id).cloned())
    }

    async fn upsert_device(&self, device: &Device) -> Result<Device> {
        let mut inner = self.lock()?;

        let slot = if device.id != 0 {
            inner.devices.iter_mut().find(|d| d.id == device.id)
        } else {
            inner.devices.iter_mut().find(|d| d.host == device.host)
        };

        if let Some(existing) = slot {
            let id = existing.id;
            *existing = device.clone();
            existing.id = id;
            return Ok(existing.clone());
        }

        let mut stored = device.clone();
        if stored.id == 0 {
            inner.next_device_id += 1;
            stored.id = inner.next_device_id;
        } else {
            inner.next_device_id = inner.next_device_id.max(stored.id);
        }
        inner.devices.push(stored.clone());
        Ok(stored)
    }

    async fn list_discovered_devices(
        &self,
        filter: &DiscoveredFilter,
    ) -> Result<Vec<DiscoveredDevice>> {
        let inner = self.lock()?;
        let mut devices: Vec<DiscoveredDevice> = inner
            .discovered
            .iter()
            .filter(|d| {
                if let Some(identified) = filter.identified {
                    if d.is_identified != identified {
                        return false;
                    }
                }
                if let Some(vendor) = &filter.vendor {
                    let matches = d
                        .vendor
                        .as_deref()
                        .map(|v| v.to_lowercase().contains(&vendor.to_lowercase()))
                        .unwrap_or(false);
                    if !matches {
                        return false;
                    }
                }
                if let Some(min_score) = filter.min_score {
                    if d.identification_score < min_score {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        devices.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        Ok(devices)
    }

    async fn get_discovered_by_mac_or_ip(
        &self,
        mac: Option<&str>,
        ip: Option<&str>,
    ) -> Result<Option<DiscoveredDevice>> {
        let inner = self.lock()?;

        if let Some(mac) = mac {
            if let Some(found) = inner.discovered.iter().find(|d| d.mac == mac) {
                return Ok(Some(found.clone()));
            }
        }

        if let Some(ip) = ip {
            let found = inner
                .discovered
                .iter()
                .filter(|d| d.ip == ip)
                .max_by_key(|d| d.last_seen);
            return Ok(found.cloned());
        }

        Ok(None)
    }

    async fn upsert_discovered_device(&self, device: &DiscoveredDevice) -> Result<DiscoveredDevice> {
        let mut inner = self.lock()?;

        let position = if device.id != 0 {
            let found = inner.discovered.iter().position(|d| d.id == device.id);
            if found.is_none() {
                bail!("Discovered device id {} not found", device.id);
            }
            found
        } else {
            inner.discovered.iter().position(|d| d.mac == device.mac)
        };

        if let Some(index) = position {
            // Matches the SQL update column list: first_seen is immutable.
            let existing = &mut inner.discovered[index];
            existing.mac = device.mac.clone();
            existing.ip = device.ip.clone();
            existing.hostname = device.hostname.clone();
            existing.vendor = device.vendor.clone();
            existing.role = device.role.clone();
            existing.is_identified = device.is_identified;
            existing.identification_score = device.identification_score;
            existing.metadata = device.metadata.clone();
            existing.last_seen = device.last_seen;
            existing.is_online = device.is_online;
            return Ok(existing.clone());
        }

        let mut stored = device.clone();
        inner.next_discovered_id += 1;
        stored.id = inner.next_discovered_id;
        inner.discovered.push(stored.clone());
        Ok(stored)
    }

    async fn count_discovered(&self) -> Result<usize> {
        let inner = self.lock()?;
        Ok(inner.discovered.len())
    }

    async fn append_discovery_log(&self, event: &DiscoveryEvent) -> Result<i64> {
        let mut inner = self.lock()?;
        inner.next_log_id += 1;
        let id = inner.next_log_id;
        inner.log.push(DiscoveryLogEntry {
            id,
            mac: event.mac.clone(),
            ip: event.ip.clone(),
            method: event.method,
            source_device_id: event.source_device_id,
            detail: event.detail.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn list_discovery_log(&self, limit: usize) -> Result<Vec<DiscoveryLogEntry>> {
        let inner = self.lock()?;
        Ok(inner.log.iter().rev().take(limit).cloned().collect())
    }

    async fn get_vendor_cache_entry(&self, prefix: &str) -> Result<Option<VendorCacheEntry>> {
        let inner = self.lock()?;
        Ok(inner.vendor_cache.get(prefix).cloned())
    }

    async fn upsert_vendor_cache_entry(&self, prefix: &str, vendor: Option<&str>) -> Result<()> {
        let mut inner = self.lock()?;
        inner.vendor_cache.insert(
            prefix.to_string(),
            VendorCacheEntry {
                prefix: prefix.to_string(),
                vendor: vendor.map(|v| v.to_string()),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn bulk_upsert_vendor_cache(&self, entries: &[(String, String)]) -> Result<usize> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        for (prefix, vendor) in entries {
            inner.vendor_cache.insert(
                prefix.clone(),
                VendorCacheEntry {
                    prefix: prefix.clone(),
                    vendor: Some(vendor.clone()),
                    updated_at: now,
                },
            );
        }
        Ok(entries.len())
    }
}
