//! Database schema definitions
//!
//! Creates and manages the SQLite tables

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all database tables
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Managed devices polled for health metrics
        CREATE TABLE IF NOT EXISTS devices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            host TEXT UNIQUE NOT NULL,
            credentials_ref TEXT NOT NULL DEFAULT '',
            is_online INTEGER NOT NULL DEFAULT 0,
            last_seen TEXT,
            uptime_seconds INTEGER,
            has_wireless INTEGER NOT NULL DEFAULT 0
        );

        -- Devices observed on the network, unique by hardware address
        CREATE TABLE IF NOT EXISTS discovered_devices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            mac TEXT UNIQUE NOT NULL,
            ip TEXT NOT NULL,
            hostname TEXT,
            vendor TEXT,
            role TEXT NOT NULL DEFAULT 'unknown',
            is_identified INTEGER NOT NULL DEFAULT 0,
            identification_score INTEGER NOT NULL DEFAULT 0,
            metadata TEXT NOT NULL DEFAULT '{}',
            first_seen TEXT NOT NULL,
            last_seen TEXT NOT NULL,
            is_online INTEGER NOT NULL DEFAULT 1
        );

        -- Append-only audit of every discovery sighting
        CREATE TABLE IF NOT EXISTS discovery_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            mac TEXT NOT NULL,
            ip TEXT NOT NULL,
            method TEXT NOT NULL,
            source_device_id INTEGER,
            detail TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        );

        -- OUI prefix to vendor name cache (vendor NULL = cached negative)
        CREATE TABLE IF NOT EXISTS vendor_cache (
            prefix TEXT PRIMARY KEY,
            vendor TEXT,
            updated_at TEXT NOT NULL
        );

        -- Indexes for performance
        CREATE INDEX IF NOT EXISTS idx_discovered_ip ON discovered_devices(ip);
        CREATE INDEX IF NOT EXISTS idx_discovered_last_seen ON discovered_devices(last_seen);
        CREATE INDEX IF NOT EXISTS idx_discovered_role ON discovered_devices(role);
        CREATE INDEX IF NOT EXISTS idx_discovery_log_mac ON discovery_log(mac);
        CREATE INDEX IF NOT EXISTS idx_discovery_log_created ON discovery_log(created_at);
        "#,
    )
    .context("Failed to create database tables")?;

    // Backward-compatible migration for databases created before AP
    // controller support existed.
    let has_ap_controller: bool = conn
        .prepare("PRAGMA table_info(devices)")
        .and_then(|mut stmt| {
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let col_name: String = row.get(1)?;
                if col_name == "has_ap_controller" {
                    return Ok(true);
                }
            }
            Ok(false)
        })
        .context("Failed to inspect devices table schema")?;

    if !has_ap_controller {
        conn.execute(
            "ALTER TABLE devices ADD COLUMN has_ap_controller INTEGER NOT NULL DEFAULT 0",
            [],
        )
        .context("Failed to migrate devices table with has_ap_controller column")?;
    }

    Ok(())
}
