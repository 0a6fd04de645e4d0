//! fleetmon — Device Fleet Discovery, Classification & Health Polling
//!
//! This crate provides fleet monitoring capabilities:
//! - Scheduled health polling of managed devices with bounded concurrency
//! - Passive discovery from ARP tables and DHCP leases
//! - Active TCP subnet sweeps
//! - Signature-based device role classification
//! - MAC vendor resolution with layered caching
//! - Interface health scoring
//! - SQLite persistence behind a swappable storage trait

pub mod alerts;
pub mod app;
pub mod classify;
pub mod cli;
pub mod client;
pub mod config;
pub mod discovery;
pub mod health;
pub mod logging;
pub mod models;
pub mod net;
pub mod poller;
pub mod storage;
pub mod vendor;

mod command_handlers;

pub use alerts::{noop_alerts, Alert, AlertCallback, AlertKind, AlertSeverity};
pub use app::{execute_command_with_context, run, AppContext, OutputHook};
pub use classify::{
    monitoring_strategy_for, Classification, ClassifierEngine, MonitoringStrategy, ProbeMethod,
    RoleSignature, BUILTIN_SIGNATURES,
};
pub use cli::{parse_cli_args, usage_text, version_text, CliArgs, CliCommand};
pub use client::{ClientError, CommandRecord, DeviceClient, DeviceClientFactory};
pub use config::*;
pub use discovery::DiscoveryEngine;
pub use health::{score_interface, HealthStatus, InterfaceCounters, InterfaceHealth};
pub use models::*;
pub use net::{
    expand_cidr, is_locally_administered, is_sentinel_mac, normalize_mac, oui_prefix,
    resolve_hostname, reverse_lookup, sentinel_mac,
};
pub use poller::{DetectedCapabilities, DeviceMetrics, InterfaceReport, PollingScheduler};
pub use storage::{MemoryStorage, SqliteStorage, Storage, VendorCacheEntry};
pub use vendor::VendorResolver;
