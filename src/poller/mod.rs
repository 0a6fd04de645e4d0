//! Polling module - cycle scheduling, per-device retry state, metrics collection

mod collector;
mod scheduler;
mod state;

pub use collector::{DetectedCapabilities, DeviceMetrics, InterfaceReport};
pub use scheduler::PollingScheduler;
