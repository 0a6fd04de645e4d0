//! MAC vendor resolution
//!
//! Resolves OUI prefixes to vendor names through a layered lookup: in-memory
//! cache, persistent store, then an external HTTP service. Negative results
//! are cached too, so unknown prefixes do not hammer the external API. A
//! bulk import can refresh the persistent layer from the public registry.

use anyhow::{anyhow, Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::config::{
    OUI_REGISTRY_URL, VENDOR_API_URL, VENDOR_CACHE_TTL_DAYS, VENDOR_LOOKUP_SPACING,
    VENDOR_LOOKUP_TIMEOUT,
};
use crate::net::{is_locally_administered, oui_prefix};
use crate::storage::{Storage, VendorCacheEntry};

/// Layered OUI-to-vendor resolver
pub struct VendorResolver {
    storage: Arc<dyn Storage>,
    http: Client,
    /// OUI prefix -> vendor; `None` values are cached negatives
    cache: Mutex<HashMap<String, Option<String>>>,
    /// Serializes external lookups and enforces their spacing
    external_gate: Mutex<Option<Instant>>,
    api_url: String,
    registry_url: String,
}

impl VendorResolver {
    pub fn new(storage: Arc<dyn Storage>) -> Result<Self> {
        let http = Client::builder()
            .timeout(VENDOR_LOOKUP_TIMEOUT)
            .build()
            .context("Failed to build vendor lookup HTTP client")?;

        Ok(Self {
            storage,
            http,
            cache: Mutex::new(HashMap::new()),
            external_gate: Mutex::new(None),
            api_url: VENDOR_API_URL.to_string(),
            registry_url: OUI_REGISTRY_URL.to_string(),
        })
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = url.into();
        self
    }

    /// Resolve the vendor for a MAC address.
    ///
    /// Returns `None` for malformed or locally-administered addresses and for
    /// prefixes no layer knows. Lookup failures are logged, never propagated;
    /// an unknown vendor is a valid answer.
    pub async fn lookup(&self, mac: &str) -> Option<String> {
        let prefix = oui_prefix(mac)?;

        if is_locally_administered(mac) {
            return None;
        }

        if let Some(cached) = self.cache.lock().await.get(&prefix) {
            return cached.clone();
        }

        match self.storage.get_vendor_cache_entry(&prefix).await {
            Ok(Some(entry)) if entry_is_fresh(&entry, Utc::now()) => {
                self.cache
                    .lock()
                    .await
                    .insert(prefix.clone(), entry.vendor.clone());
                return entry.vendor;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Vendor cache read failed for {}: {}", prefix, e);
            }
        }

        match self.fetch_external(&prefix).await {
            Ok(vendor) => {
                if let Err(e) = self
                    .storage
                    .upsert_vendor_cache_entry(&prefix, vendor.as_deref())
                    .await
                {
                    tracing::warn!("Vendor cache write failed for {}: {}", prefix, e);
                }
                self.cache.lock().await.insert(prefix, vendor.clone());
                vendor
            }
            Err(e) => {
                tracing::warn!("External vendor lookup failed for {}: {}", prefix, e);
                // Memory-only miss: the next process run retries the API.
                self.cache.lock().await.insert(prefix, None);
                None
            }
        }
    }

    /// Query the external service for one prefix. `Ok(None)` is a definitive
    /// negative (unknown prefix); transport and server errors are `Err`.
    async fn fetch_external(&self, prefix: &str) -> Result<Option<String>> {
        let mut gate = self.external_gate.lock().await;
        if let Some(last) = *gate {
            let elapsed = last.elapsed();
            if elapsed < VENDOR_LOOKUP_SPACING {
                tokio::time::sleep(VENDOR_LOOKUP_SPACING - elapsed).await;
            }
        }
        *gate = Some(Instant::now());

        let url = self.api_url.replace("{mac}", prefix);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Vendor API request failed")?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(anyhow!("Vendor API returned {}", status));
        }

        let body = response
            .text()
            .await
            .context("Failed to read vendor API response")?;
        let vendor = body.trim();
        if vendor.is_empty() {
            return Ok(None);
        }
        Ok(Some(vendor.to_string()))
    }

    /// Download the public OUI registry and bulk-refresh the persistent
    /// cache. Returns the number of imported prefixes.
    pub async fn update_database(&self) -> Result<usize> {
        tracing::info!("Downloading OUI registry from {}", self.registry_url);

        let response = self
            .http
            .get(&self.registry_url)
            .send()
            .await
            .context("OUI registry request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("OUI registry returned {}", status));
        }

        let body = response
            .text()
            .await
            .context("Failed to read OUI registry response")?;

        let entries = parse_oui_csv(&body);
        if entries.is_empty() {
            return Err(anyhow!("OUI registry parsed to zero entries"));
        }

        let written = self
            .storage
            .bulk_upsert_vendor_cache(&entries)
            .await
            .context("Failed to import OUI registry")?;

        // Drop stale in-memory negatives superseded by the import.
        self.cache.lock().await.clear();

        tracing::info!("Imported {} OUI prefixes", written);
        Ok(written)
    }
}

/// TTL check for a persisted vendor entry.
fn entry_is_fresh(entry: &VendorCacheEntry, now: chrono::DateTime<Utc>) -> bool {
    now - entry.updated_at < ChronoDuration::days(VENDOR_CACHE_TTL_DAYS)
}

/// Parse the registry CSV (`Registry,Assignment,Organization Name,...`) into
/// `(prefix, vendor)` pairs, skipping malformed rows.
fn parse_oui_csv(data: &str) -> Vec<(String, String)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data.as_bytes());

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(_) => continue,
        };
        let prefix = record.get(1).unwrap_or("").trim().to_uppercase();
        let vendor = record.get(2).unwrap_or("").trim().to_string();

        if prefix.len() != 6 || !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            continue;
        }
        if vendor.is_empty() {
            continue;
        }
        entries.push((prefix, vendor));
    }
    entries
}
