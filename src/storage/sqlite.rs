//! SQLite-backed storage
//!
//! Thread-safe wrapper around a single SQLite connection plus the row-level
//! query implementations behind the [`Storage`] trait.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use super::schema;
use super::{Storage, VendorCacheEntry};
use crate::config::VENDOR_IMPORT_BATCH;
use crate::models::{
    DetectionMethod, Device, DiscoveredDevice, DiscoveredFilter, DiscoveryEvent, DiscoveryLogEntry,
};

/// Database wrapper with thread-safe connection
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteStorage {
    /// Creates a new database connection
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file (created if not exists)
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(&path).context("Failed to open database")?;

        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        };
        storage.initialize()?;

        Ok(storage)
    }

    /// Creates an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;

        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        };
        storage.initialize()?;

        Ok(storage)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;
        schema::create_tables(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))
    }

    /// Get database path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Get default database path for the application
    pub fn default_path() -> PathBuf {
        #[cfg(target_os = "windows")]
        let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));

        #[cfg(not(target_os = "windows"))]
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));

        base.join("fleetmon").join("fleetmon.db")
    }
}

impl Clone for SqliteStorage {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            path: self.path.clone(),
        }
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn list_devices(&self) -> Result<Vec<Device>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, name, host, credentials_ref, is_online, last_seen,
                   uptime_seconds, has_wireless, has_ap_controller
            FROM devices
            ORDER BY id
            "#,
        )?;
        let devices = stmt
            .query_map([], device_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list devices")?;
        Ok(devices)
    }

    async fn get_device(&self, id: i64) -> Result<Option<Device>> {
        let conn = self.lock()?;
        conn.query_row(
            r#"
            SELECT id, name, host, credentials_ref, is_online, last_seen,
                   uptime_seconds, has_wireless, has_ap_controller
            FROM devices
            WHERE id = ?1
            "#,
            params![id],
            device_from_row,
        )
        .optional()
        .context("Failed to get device")
    }

    async fn upsert_device(&self, device: &Device) -> Result<Device> {
        let conn = self.lock()?;

        let existing_id: Option<i64> = if device.id != 0 {
            Some(device.id)
        } else {
            conn.query_row(
                "SELECT id FROM devices WHERE host = ?1",
                params![&device.host],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to look up device by host")?
        };

        let id = match existing_id {
            Some(id) => {
                conn.execute(
                    r#"
                    UPDATE devices SET
                        name = ?2,
                        host = ?3,
                        credentials_ref = ?4,
                        is_online = ?5,
                        last_seen = ?6,
                        uptime_seconds = ?7,
                        has_wireless = ?8,
                        has_ap_controller = ?9
                    WHERE id = ?1
                    "#,
                    params![
                        id,
                        &device.name,
                        &device.host,
                        &device.credentials_ref,
                        device.is_online,
                        device.last_seen.map(|t| t.to_rfc3339()),
                        device.uptime_seconds.map(|u| u as i64),
                        device.has_wireless,
                        device.has_ap_controller,
                    ],
                )
                .context("Failed to update device")?;
                id
            }
            None => {
                conn.execute(
                    r#"
                    INSERT INTO devices (
                        name, host, credentials_ref, is_online, last_seen,
                        uptime_seconds, has_wireless, has_ap_controller
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                    params![
                        &device.name,
                        &device.host,
                        &device.credentials_ref,
                        device.is_online,
                        device.last_seen.map(|t| t.to_rfc3339()),
                        device.uptime_seconds.map(|u| u as i64),
                        device.has_wireless,
                        device.has_ap_controller,
                    ],
                )
                .context("Failed to insert device")?;
                conn.last_insert_rowid()
            }
        };

        let mut stored = device.clone();
        stored.id = id;
        Ok(stored)
    }

    async fn list_discovered_devices(
        &self,
        filter: &DiscoveredFilter,
    ) -> Result<Vec<DiscoveredDevice>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, mac, ip, hostname, vendor, role, is_identified,
                   identification_score, metadata, first_seen, last_seen, is_online
            FROM discovered_devices
            WHERE (?1 IS NULL OR is_identified = ?1)
              AND (?2 IS NULL OR LOWER(vendor) LIKE '%' || LOWER(?2) || '%')
              AND (?3 IS NULL OR identification_score >= ?3)
            ORDER BY last_seen DESC
            "#,
        )?;
        let devices = stmt
            .query_map(
                params![
                    filter.identified,
                    filter.vendor.as_deref(),
                    filter.min_score.map(|s| s as i64),
                ],
                discovered_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list discovered devices")?;
        Ok(devices)
    }

    async fn get_discovered_by_mac_or_ip(
        &self,
        mac: Option<&str>,
        ip: Option<&str>,
    ) -> Result<Option<DiscoveredDevice>> {
        let conn = self.lock()?;

        if let Some(mac) = mac {
            let by_mac = conn
                .query_row(
                    r#"
                    SELECT id, mac, ip, hostname, vendor, role, is_identified,
                           identification_score, metadata, first_seen, last_seen, is_online
                    FROM discovered_devices
                    WHERE mac = ?1
                    "#,
                    params![mac],
                    discovered_from_row,
                )
                .optional()
                .context("Failed to look up discovered device by MAC")?;
            if by_mac.is_some() {
                return Ok(by_mac);
            }
        }

        if let Some(ip) = ip {
            return conn
                .query_row(
                    r#"
                    SELECT id, mac, ip, hostname, vendor, role, is_identified,
                           identification_score, metadata, first_seen, last_seen, is_online
                    FROM discovered_devices
                    WHERE ip = ?1
                    ORDER BY last_seen DESC
                    LIMIT 1
                    "#,
                    params![ip],
                    discovered_from_row,
                )
                .optional()
                .context("Failed to look up discovered device by IP");
        }

        Ok(None)
    }

    async fn upsert_discovered_device(&self, device: &DiscoveredDevice) -> Result<DiscoveredDevice> {
        let conn = self.lock()?;

        let existing_id: Option<i64> = if device.id != 0 {
            Some(device.id)
        } else {
            conn.query_row(
                "SELECT id FROM discovered_devices WHERE mac = ?1",
                params![&device.mac],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to look up discovered device by MAC")?
        };

        let metadata =
            serde_json::to_string(&device.metadata).context("Failed to serialize metadata")?;

        let id = match existing_id {
            Some(id) => {
                conn.execute(
                    r#"
                    UPDATE discovered_devices SET
                        mac = ?2,
                        ip = ?3,
                        hostname = ?4,
                        vendor = ?5,
                        role = ?6,
                        is_identified = ?7,
                        identification_score = ?8,
                        metadata = ?9,
                        last_seen = ?10,
                        is_online = ?11
                    WHERE id = ?1
                    "#,
                    params![
                        id,
                        &device.mac,
                        &device.ip,
                        &device.hostname,
                        &device.vendor,
                        &device.role,
                        device.is_identified,
                        device.identification_score as i64,
                        metadata,
                        device.last_seen.to_rfc3339(),
                        device.is_online,
                    ],
                )
                .context("Failed to update discovered device")?;
                id
            }
            None => {
                conn.execute(
                    r#"
                    INSERT INTO discovered_devices (
                        mac, ip, hostname, vendor, role, is_identified,
                        identification_score, metadata, first_seen, last_seen, is_online
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    "#,
                    params![
                        &device.mac,
                        &device.ip,
                        &device.hostname,
                        &device.vendor,
                        &device.role,
                        device.is_identified,
                        device.identification_score as i64,
                        metadata,
                        device.first_seen.to_rfc3339(),
                        device.last_seen.to_rfc3339(),
                        device.is_online,
                    ],
                )
                .context("Failed to insert discovered device")?;
                conn.last_insert_rowid()
            }
        };

        conn.query_row(
            r#"
            SELECT id, mac, ip, hostname, vendor, role, is_identified,
                   identification_score, metadata, first_seen, last_seen, is_online
            FROM discovered_devices
            WHERE id = ?1
            "#,
            params![id],
            discovered_from_row,
        )
        .context("Failed to read back discovered device")
    }

    async fn count_discovered(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM discovered_devices", [], |row| {
                row.get(0)
            })
            .context("Failed to count discovered devices")?;
        Ok(count as usize)
    }

    async fn append_discovery_log(&self, event: &DiscoveryEvent) -> Result<i64> {
        let conn = self.lock()?;
        let detail =
            serde_json::to_string(&event.detail).context("Failed to serialize log detail")?;
        conn.execute(
            r#"
            INSERT INTO discovery_log (mac, ip, method, source_device_id, detail, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                &event.mac,
                &event.ip,
                event.method.as_str(),
                event.source_device_id,
                detail,
                Utc::now().to_rfc3339(),
            ],
        )
        .context("Failed to append discovery log entry")?;
        Ok(conn.last_insert_rowid())
    }

    async fn list_discovery_log(&self, limit: usize) -> Result<Vec<DiscoveryLogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, mac, ip, method, source_device_id, detail, created_at
            FROM discovery_log
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;
        let entries = stmt
            .query_map(params![limit as i64], log_entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list discovery log")?;
        Ok(entries)
    }

    async fn get_vendor_cache_entry(&self, prefix: &str) -> Result<Option<VendorCacheEntry>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT prefix, vendor, updated_at FROM vendor_cache WHERE prefix = ?1",
            params![prefix],
            |row| {
                Ok(VendorCacheEntry {
                    prefix: row.get(0)?,
                    vendor: row.get(1)?,
                    updated_at: parse_datetime_column(row.get::<_, String>(2)?, 2)?,
                })
            },
        )
        .optional()
        .context("Failed to get vendor cache entry")
    }

    async fn upsert_vendor_cache_entry(&self, prefix: &str, vendor: Option<&str>) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO vendor_cache (prefix, vendor, updated_at) VALUES (?1, ?2, ?3)",
            params![prefix, vendor, Utc::now().to_rfc3339()],
        )
        .context("Failed to upsert vendor cache entry")?;
        Ok(())
    }

    async fn bulk_upsert_vendor_cache(&self, entries: &[(String, String)]) -> Result<usize> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        let mut written = 0usize;

        for chunk in entries.chunks(VENDOR_IMPORT_BATCH) {
            conn.execute_batch("SAVEPOINT vendor_import")
                .context("Failed to start vendor import transaction")?;

            let chunk_result = (|| -> Result<()> {
                let mut stmt = conn.prepare_cached(
                    "INSERT OR REPLACE INTO vendor_cache (prefix, vendor, updated_at) VALUES (?1, ?2, ?3)",
                )?;
                for (prefix, vendor) in chunk {
                    stmt.execute(params![prefix, vendor, now])
                        .context("Failed to insert vendor cache row")?;
                }
                Ok(())
            })();

            match chunk_result {
                Ok(()) => {
                    conn.execute_batch("RELEASE vendor_import")
                        .context("Failed to commit vendor import batch")?;
                    written += chunk.len();
                }
                Err(e) => {
                    let _ = conn.execute_batch("ROLLBACK TO vendor_import; RELEASE vendor_import");
                    return Err(e);
                }
            }
        }

        Ok(written)
    }
}

fn device_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        id: row.get(0)?,
        name: row.get(1)?,
        host: row.get(2)?,
        credentials_ref: row.get(3)?,
        is_online: row.get(4)?,
        last_seen: row
            .get::<_, Option<String>>(5)?
            .map(|s| parse_datetime_column(s, 5))
            .transpose()?,
        uptime_seconds: row.get::<_, Option<i64>>(6)?.map(|u| u as u64),
        has_wireless: row.get(7)?,
        has_ap_controller: row.get(8)?,
    })
}

fn discovered_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DiscoveredDevice> {
    Ok(DiscoveredDevice {
        id: row.get(0)?,
        mac: row.get(1)?,
        ip: row.get(2)?,
        hostname: row.get(3)?,
        vendor: row.get(4)?,
        role: row.get(5)?,
        is_identified: row.get(6)?,
        identification_score: row.get::<_, i64>(7)?.clamp(0, 100) as u8,
        metadata: parse_json_or_empty(row.get::<_, String>(8)?),
        first_seen: parse_datetime_column(row.get::<_, String>(9)?, 9)?,
        last_seen: parse_datetime_column(row.get::<_, String>(10)?, 10)?,
        is_online: row.get(11)?,
    })
}

fn log_entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DiscoveryLogEntry> {
    Ok(DiscoveryLogEntry {
        id: row.get(0)?,
        mac: row.get(1)?,
        ip: row.get(2)?,
        method: parse_method_or_default(&row.get::<_, String>(3)?),
        source_device_id: row.get(4)?,
        detail: parse_json_or_empty(row.get::<_, String>(5)?),
        created_at: parse_datetime_column(row.get::<_, String>(6)?, 6)?,
    })
}

/// Helper: Parse an RFC3339 column into a chrono DateTime
fn parse_datetime_column(s: String, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn parse_json_or_empty(s: String) -> serde_json::Value {
    match serde_json::from_str(&s) {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Unparsable JSON column in database, replacing with empty object");
            serde_json::json!({})
        }
    }
}

fn parse_method_or_default(s: &str) -> DetectionMethod {
    match DetectionMethod::parse(s) {
        Some(method) => method,
        None => {
            tracing::warn!("Unknown detection method in database: {}", s);
            DetectionMethod::Manual
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ROLE_UNKNOWN;

    #[tokio::test]
    async fn test_device_upsert_round_trip() {
        let storage = SqliteStorage::in_memory().unwrap();

        let stored = storage
            .upsert_device(&Device::new("core-gw", "10.0.0.1", "cred-1"))
            .await
            .unwrap();
        assert!(stored.id > 0);

        // Same host updates in place instead of inserting a duplicate.
        let mut updated = Device::new("core-gw-renamed", "10.0.0.1", "cred-1");
        updated.is_online = true;
        updated.uptime_seconds = Some(3600);
        let stored_again = storage.upsert_device(&updated).await.unwrap();
        assert_eq!(stored_again.id, stored.id);

        let devices = storage.list_devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "core-gw-renamed");
        assert!(devices[0].is_online);
        assert_eq!(devices[0].uptime_seconds, Some(3600));
    }

    #[tokio::test]
    async fn test_discovered_lookup_prefers_mac_over_ip() {
        let storage = SqliteStorage::in_memory().unwrap();

        let a = DiscoveredDevice::new("aa:aa:aa:aa:aa:01", "10.0.0.5");
        let mut b = DiscoveredDevice::new("aa:aa:aa:aa:aa:02", "10.0.0.6");
        b.last_seen = Utc::now();
        storage.upsert_discovered_device(&a).await.unwrap();
        storage.upsert_discovered_device(&b).await.unwrap();

        let found = storage
            .get_discovered_by_mac_or_ip(Some("aa:aa:aa:aa:aa:01"), Some("10.0.0.6"))
            .await
            .unwrap()
            .expect("device should exist");
        assert_eq!(found.mac, "aa:aa:aa:aa:aa:01", "MAC match wins over IP");

        let by_ip = storage
            .get_discovered_by_mac_or_ip(None, Some("10.0.0.6"))
            .await
            .unwrap()
            .expect("device should exist");
        assert_eq!(by_ip.mac, "aa:aa:aa:aa:aa:02");
    }

    #[tokio::test]
    async fn test_discovered_upsert_rewrites_sentinel_mac() {
        let storage = SqliteStorage::in_memory().unwrap();

        let sentinel = DiscoveredDevice::new("unknown_10.0.0.9", "10.0.0.9");
        let stored = storage.upsert_discovered_device(&sentinel).await.unwrap();

        let mut upgraded = stored.clone();
        upgraded.mac = "bb:bb:bb:bb:bb:01".to_string();
        let stored_again = storage.upsert_discovered_device(&upgraded).await.unwrap();

        assert_eq!(stored_again.id, stored.id);
        assert_eq!(stored_again.mac, "bb:bb:bb:bb:bb:01");
        assert_eq!(storage.count_discovered().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_discovered_filter_clauses() {
        let storage = SqliteStorage::in_memory().unwrap();

        let mut identified = DiscoveredDevice::new("cc:cc:cc:cc:cc:01", "10.0.1.1");
        identified.vendor = Some("MikroTik".to_string());
        identified.role = "router".to_string();
        identified.is_identified = true;
        identified.identification_score = 80;
        storage.upsert_discovered_device(&identified).await.unwrap();

        let mut unknown = DiscoveredDevice::new("cc:cc:cc:cc:cc:02", "10.0.1.2");
        unknown.identification_score = 20;
        storage.upsert_discovered_device(&unknown).await.unwrap();

        let all = storage
            .list_discovered_devices(&DiscoveredFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let identified_only = storage
            .list_discovered_devices(&DiscoveredFilter {
                identified: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(identified_only.len(), 1);
        assert_eq!(identified_only[0].role, "router");

        let by_vendor = storage
            .list_discovered_devices(&DiscoveredFilter {
                vendor: Some("mikrotik".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_vendor.len(), 1);

        let by_score = storage
            .list_discovered_devices(&DiscoveredFilter {
                min_score: Some(50),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_score.len(), 1);

        let none = storage
            .list_discovered_devices(&DiscoveredFilter {
                identified: Some(false),
                min_score: Some(50),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(none.is_empty());

        assert_eq!(unknown.role, ROLE_UNKNOWN);
    }

    #[tokio::test]
    async fn test_discovery_log_append_and_list() {
        let storage = SqliteStorage::in_memory().unwrap();

        let event = DiscoveryEvent {
            mac: "dd:dd:dd:dd:dd:01".to_string(),
            ip: "10.0.2.1".to_string(),
            method: DetectionMethod::Arp,
            source_device_id: Some(7),
            detail: serde_json::json!({"interface": "bridge"}),
        };
        let first_id = storage.append_discovery_log(&event).await.unwrap();
        let second_id = storage.append_discovery_log(&event).await.unwrap();
        assert!(second_id > first_id, "audit log is append-only");

        let entries = storage.list_discovery_log(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, second_id, "newest first");
        assert_eq!(entries[0].method, DetectionMethod::Arp);
        assert_eq!(entries[0].source_device_id, Some(7));
        assert_eq!(entries[0].detail["interface"], "bridge");
    }

    #[tokio::test]
    async fn test_vendor_cache_stores_negatives() {
        let storage = SqliteStorage::in_memory().unwrap();

        storage
            .upsert_vendor_cache_entry("AABBCC", Some("MikroTik"))
            .await
            .unwrap();
        storage
            .upsert_vendor_cache_entry("DDEEFF", None)
            .await
            .unwrap();

        let hit = storage
            .get_vendor_cache_entry("AABBCC")
            .await
            .unwrap()
            .expect("entry should exist");
        assert_eq!(hit.vendor.as_deref(), Some("MikroTik"));

        let negative = storage
            .get_vendor_cache_entry("DDEEFF")
            .await
            .unwrap()
            .expect("negative entry should exist");
        assert_eq!(negative.vendor, None);

        assert!(storage
            .get_vendor_cache_entry("123456")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_bulk_vendor_import_batches() {
        let storage = SqliteStorage::in_memory().unwrap();

        let entries: Vec<(String, String)> = (0..1203)
            .map(|i| (format!("{:06X}", i), format!("Vendor {}", i)))
            .collect();

        let written = storage.bulk_upsert_vendor_cache(&entries).await.unwrap();
        assert_eq!(written, 1203);

        let sample = storage
            .get_vendor_cache_entry("0004B0")
            .await
            .unwrap()
            .expect("imported entry should exist");
        assert_eq!(sample.vendor.as_deref(), Some("Vendor 1200"));
    }
}
