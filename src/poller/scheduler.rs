//! Polling scheduler
//!
//! Drives the repeating poll cycle: admits idle devices up to the
//! concurrency budget, races each poll against the request timeout, and
//! walks the per-device retry machine on failures. A device failure stays
//! contained to its slot; the cycle and the other devices keep going.

use anyhow::{bail, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::collector::{collect_metrics, DeviceMetrics};
use super::state::{AttemptOutcome, NextAction, PollRegistry};
use crate::alerts::{Alert, AlertCallback, AlertKind};
use crate::client::DeviceClientFactory;
use crate::config::{PollerConfig, CONNECT_TIMEOUT, MIN_MAX_CONCURRENT_POLLS, MIN_POLL_INTERVAL_MS};
use crate::models::{Device, PollingStatus};
use crate::storage::Storage;

/// Periodically polls every managed device for metrics and liveness
pub struct PollingScheduler {
    storage: Arc<dyn Storage>,
    clients: Arc<dyn DeviceClientFactory>,
    alerts: AlertCallback,
    config: PollerConfig,
    is_running: Arc<AtomicBool>,
    cycle_count: Arc<AtomicU32>,
    interval_ms: Arc<Mutex<u64>>,
    max_concurrent: Arc<Mutex<usize>>,
    registry: Arc<Mutex<PollRegistry>>,
}

impl Clone for PollingScheduler {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            clients: Arc::clone(&self.clients),
            alerts: Arc::clone(&self.alerts),
            config: self.config.clone(),
            is_running: Arc::clone(&self.is_running),
            cycle_count: Arc::clone(&self.cycle_count),
            interval_ms: Arc::clone(&self.interval_ms),
            max_concurrent: Arc::clone(&self.max_concurrent),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl PollingScheduler {
    pub fn new(
        storage: Arc<dyn Storage>,
        clients: Arc<dyn DeviceClientFactory>,
        alerts: AlertCallback,
        config: PollerConfig,
    ) -> Self {
        let interval_ms = config.interval_ms.max(MIN_POLL_INTERVAL_MS);
        let max_concurrent = config.max_concurrent.max(MIN_MAX_CONCURRENT_POLLS);
        Self {
            registry: Arc::new(Mutex::new(PollRegistry::new(config.max_retries))),
            interval_ms: Arc::new(Mutex::new(interval_ms)),
            max_concurrent: Arc::new(Mutex::new(max_concurrent)),
            is_running: Arc::new(AtomicBool::new(false)),
            cycle_count: Arc::new(AtomicU32::new(0)),
            storage,
            clients,
            alerts,
            config,
        }
    }

    /// Start the repeating poll cycle. Idempotent.
    pub fn start(&self) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            tracing::debug!("[POLLER] Scheduler already running");
            return;
        }
        self.cycle_count.store(0, Ordering::SeqCst);

        let scheduler = self.clone();
        tokio::spawn(async move {
            let interval = *scheduler.interval_ms.lock().await;
            tracing::info!("[POLLER] Scheduler started (interval: {}ms)", interval);

            while scheduler.is_running.load(Ordering::SeqCst) {
                let cycle = scheduler.cycle_count.fetch_add(1, Ordering::SeqCst) + 1;
                if let Err(e) = scheduler.run_cycle(cycle).await {
                    tracing::warn!("[POLLER] Cycle #{} failed: {}", cycle, e);
                }

                // Wait out the interval, checking each second for a quick stop.
                let interval = *scheduler.interval_ms.lock().await;
                let mut slept = 0u64;
                while slept < interval {
                    if !scheduler.is_running.load(Ordering::SeqCst) {
                        break;
                    }
                    let step = (interval - slept).min(1_000);
                    tokio::time::sleep(Duration::from_millis(step)).await;
                    slept += step;
                }
            }

            tracing::info!("[POLLER] Scheduler stopped");
        });
    }

    /// Stop admitting new polls. Polls already in flight run to completion.
    pub fn stop(&self) {
        self.is_running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Change the cycle interval. Takes effect on the next cycle.
    pub async fn set_polling_interval(&self, ms: u64) -> Result<()> {
        if ms < MIN_POLL_INTERVAL_MS {
            bail!(
                "polling interval {}ms is below the {}ms minimum",
                ms,
                MIN_POLL_INTERVAL_MS
            );
        }
        *self.interval_ms.lock().await = ms;
        tracing::info!("[POLLER] Interval set to {}ms", ms);
        Ok(())
    }

    /// Change the concurrent poll budget. Takes effect on the next cycle.
    pub async fn set_max_concurrent_devices(&self, n: usize) -> Result<()> {
        if n < MIN_MAX_CONCURRENT_POLLS {
            bail!("concurrent poll budget must be at least {}", MIN_MAX_CONCURRENT_POLLS);
        }
        *self.max_concurrent.lock().await = n;
        tracing::info!("[POLLER] Concurrency budget set to {}", n);
        Ok(())
    }

    /// Snapshot of the scheduler and every device's polling state.
    pub async fn polling_status(&self) -> PollingStatus {
        let interval_ms = *self.interval_ms.lock().await;
        let max_concurrent = *self.max_concurrent.lock().await;
        let registry = self.registry.lock().await;
        PollingStatus {
            is_running: self.is_running.load(Ordering::SeqCst),
            interval_ms,
            max_concurrent,
            active_in_flight: registry.active_in_flight(),
            devices: registry.snapshot(),
        }
    }

    /// Run one admission cycle immediately, outside the schedule. Returns
    /// how many devices were admitted.
    pub async fn poll_now(&self) -> Result<usize> {
        let cycle = self.cycle_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.run_cycle(cycle).await
    }

    async fn run_cycle(&self, cycle: u32) -> Result<usize> {
        let devices = self.storage.list_devices().await?;

        let admitted: Vec<Device> = {
            let max = *self.max_concurrent.lock().await;
            let mut registry = self.registry.lock().await;
            registry.sync_devices(&devices);

            let budget = max.saturating_sub(registry.active_in_flight());
            let ids: Vec<i64> = registry.eligible_order().into_iter().take(budget).collect();
            for id in &ids {
                registry.begin_attempt(*id);
            }
            ids.iter()
                .filter_map(|id| devices.iter().find(|d| d.id == *id).cloned())
                .collect()
        };

        tracing::debug!(
            "[POLLER] Cycle #{}: admitting {} of {} devices",
            cycle,
            admitted.len(),
            devices.len()
        );

        let count = admitted.len();
        for device in admitted {
            let scheduler = self.clone();
            tokio::spawn(async move {
                let device_id = device.id;
                let task = tokio::spawn({
                    let scheduler = scheduler.clone();
                    async move { scheduler.poll_device(device).await }
                });
                // A crashed poll task must not strand its admission slot.
                if let Err(e) = task.await {
                    tracing::error!("[POLLER] Poll task for device {} died: {}", device_id, e);
                    let mut registry = scheduler.registry.lock().await;
                    registry.abandon(device_id, "poll task crashed");
                }
            });
        }

        Ok(count)
    }

    /// Drive one device's poll to a terminal state: success, or retries
    /// exhausted. The admission slot stays held across retry delays.
    async fn poll_device(&self, device: Device) {
        loop {
            let outcome = self.attempt(&device).await;
            let error_text = match &outcome {
                AttemptOutcome::Failure(e) => e.clone(),
                AttemptOutcome::Success => String::new(),
            };

            let action = {
                let mut registry = self.registry.lock().await;
                registry.record(device.id, &outcome)
            };

            match action {
                NextAction::Settle { recovered_from } => {
                    if recovered_from > 0 {
                        tracing::info!(
                            "[POLLER] {} reconnected after {} failed polls",
                            device.name,
                            recovered_from
                        );
                        (self.alerts)(
                            Alert::new(
                                AlertKind::DeviceReconnected,
                                format!(
                                    "Device {} reconnected after {} failed polls",
                                    device.name, recovered_from
                                ),
                            )
                            .with_device(&device.name),
                        );
                    }
                    return;
                }
                NextAction::Retry { attempt } => {
                    tracing::debug!(
                        "[POLLER] {} attempt {} failed ({}), retrying in {:?}",
                        device.name,
                        attempt,
                        error_text,
                        self.config.retry_delay
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                    let mut registry = self.registry.lock().await;
                    registry.begin_attempt(device.id);
                }
                NextAction::GiveUp { failures, announce } => {
                    if announce {
                        tracing::warn!(
                            "[POLLER] {} unreachable after {} attempts: {}",
                            device.name,
                            failures,
                            error_text
                        );
                        (self.alerts)(
                            Alert::new(
                                AlertKind::PollRetriesExhausted,
                                format!(
                                    "Polling {} failed {} times in a row: {}",
                                    device.name, failures, error_text
                                ),
                            )
                            .with_device(&device.name),
                        );
                    }
                    self.mark_device_offline(&device).await;
                    return;
                }
            }
        }
    }

    /// One timed poll attempt. On timeout the in-progress collection is
    /// dropped, not left running.
    async fn attempt(&self, device: &Device) -> AttemptOutcome {
        let client = self.clients.client_for(device);
        let collection = collect_metrics(client.as_ref(), device, CONNECT_TIMEOUT);

        match timeout(self.config.request_timeout, collection).await {
            Ok(Ok(metrics)) => {
                let degraded = metrics.degraded_interfaces();
                if degraded > 0 {
                    tracing::warn!(
                        "[POLLER] {}: {} of {} interfaces degraded",
                        device.name,
                        degraded,
                        metrics.interfaces.len()
                    );
                }
                self.store_poll_success(device, &metrics).await;
                AttemptOutcome::Success
            }
            Ok(Err(e)) => AttemptOutcome::Failure(e.to_string()),
            Err(_) => AttemptOutcome::Failure(format!(
                "no response within {}s",
                self.config.request_timeout.as_secs()
            )),
        }
    }

    /// A storage hiccup here is logged and contained: the device answered,
    /// so the poll itself still counts as a success.
    async fn store_poll_success(&self, device: &Device, metrics: &DeviceMetrics) {
        match self.storage.get_device(device.id).await {
            Ok(Some(mut fresh)) => {
                fresh.is_online = true;
                fresh.last_seen = Some(Utc::now());
                fresh.uptime_seconds = metrics.uptime_seconds;
                if let Some(caps) = metrics.capabilities {
                    fresh.has_wireless = caps.wireless;
                    fresh.has_ap_controller = caps.ap_controller;
                }
                if let Err(e) = self.storage.upsert_device(&fresh).await {
                    tracing::warn!("[POLLER] Failed to store poll result for {}: {}", device.name, e);
                }
            }
            Ok(None) => tracing::debug!("[POLLER] {} removed mid-poll", device.name),
            Err(e) => tracing::warn!("[POLLER] Failed to load {} for update: {}", device.name, e),
        }
    }

    async fn mark_device_offline(&self, device: &Device) {
        match self.storage.get_device(device.id).await {
            Ok(Some(mut fresh)) => {
                if !fresh.is_online {
                    return;
                }
                fresh.is_online = false;
                if let Err(e) = self.storage.upsert_device(&fresh).await {
                    tracing::warn!("[POLLER] Failed to mark {} offline: {}", device.name, e);
                }
            }
            Ok(None) => tracing::debug!("[POLLER] {} removed mid-poll", device.name),
            Err(e) => tracing::warn!("[POLLER] Failed to load {} for update: {}", device.name, e),
        }
    }
}
