//! Alert types for fleet monitoring
//!
//! Defines alert categories, severity levels and the callback seam through
//! which the scheduler and discovery engine report conditions upward.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "INFO",
            AlertSeverity::Warning => "WARNING",
            AlertSeverity::Critical => "CRITICAL",
        }
    }
}

/// Conditions the engine reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    /// A device exhausted its poll retries and was marked offline
    PollRetriesExhausted,
    /// A previously failing device answered a poll again
    DeviceReconnected,
    /// A device was seen for the first time
    NewDeviceDiscovered,
    /// A discovered device has not been seen within the staleness window
    DeviceWentStale,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::PollRetriesExhausted => "POLL_RETRIES_EXHAUSTED",
            AlertKind::DeviceReconnected => "DEVICE_RECONNECTED",
            AlertKind::NewDeviceDiscovered => "NEW_DEVICE",
            AlertKind::DeviceWentStale => "DEVICE_STALE",
        }
    }

    pub fn severity(&self) -> AlertSeverity {
        match self {
            AlertKind::PollRetriesExhausted => AlertSeverity::Warning,
            AlertKind::DeviceReconnected => AlertSeverity::Info,
            AlertKind::NewDeviceDiscovered => AlertSeverity::Info,
            AlertKind::DeviceWentStale => AlertSeverity::Info,
        }
    }
}

/// A generated alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    pub message: String,
}

impl Alert {
    pub fn new(kind: AlertKind, message: impl Into<String>) -> Self {
        let severity = kind.severity();
        Self {
            kind,
            severity,
            device_name: None,
            message: message.into(),
        }
    }

    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn with_severity(mut self, severity: AlertSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Alert callback type
pub type AlertCallback = Arc<dyn Fn(Alert) + Send + Sync>;

/// Callback that drops every alert; useful where no sink is wired.
pub fn noop_alerts() -> AlertCallback {
    Arc::new(|_| {})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_default_severities() {
        assert_eq!(
            AlertKind::PollRetriesExhausted.severity(),
            AlertSeverity::Warning
        );
        assert_eq!(AlertKind::DeviceReconnected.severity(), AlertSeverity::Info);
    }

    #[test]
    fn test_alert_builder() {
        let alert = Alert::new(AlertKind::PollRetriesExhausted, "3 consecutive failures")
            .with_device("core-gw")
            .with_severity(AlertSeverity::Critical);

        assert_eq!(alert.kind.as_str(), "POLL_RETRIES_EXHAUSTED");
        assert_eq!(alert.device_name.as_deref(), Some("core-gw"));
        assert_eq!(alert.severity, AlertSeverity::Critical);
    }
}
