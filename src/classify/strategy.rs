//! Monitoring strategies per device role
//!
//! Static lookup from classified role to collection methods and cadence.
//! Roles we know little about get the most conservative treatment.

use std::time::Duration;

use crate::models::ROLE_UNKNOWN;

/// Collection method, in the order a poller should try them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMethod {
    ManagementApi,
    Snmp,
    FlowExport,
    Icmp,
}

impl ProbeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeMethod::ManagementApi => "management-api",
            ProbeMethod::Snmp => "snmp",
            ProbeMethod::FlowExport => "flow-export",
            ProbeMethod::Icmp => "icmp",
        }
    }
}

/// How a device of a given role should be monitored
#[derive(Debug, Clone)]
pub struct MonitoringStrategy {
    /// Preferred collection methods, highest priority first
    pub methods: &'static [ProbeMethod],
    pub metrics: &'static [&'static str],
    pub interval: Duration,
}

/// Map a classified role to its monitoring strategy. Unrecognized roles get
/// the same conservative treatment as `unknown`.
pub fn monitoring_strategy_for(role: &str) -> MonitoringStrategy {
    use ProbeMethod::*;

    match role {
        "router" => MonitoringStrategy {
            methods: &[ManagementApi, Snmp, FlowExport, Icmp],
            metrics: &["interfaces", "resources", "routing"],
            interval: Duration::from_secs(60),
        },
        "firewall" => MonitoringStrategy {
            methods: &[ManagementApi, Snmp, Icmp],
            metrics: &["interfaces", "resources", "sessions"],
            interval: Duration::from_secs(60),
        },
        "switch" => MonitoringStrategy {
            methods: &[Snmp, ManagementApi, Icmp],
            metrics: &["interfaces", "resources"],
            interval: Duration::from_secs(120),
        },
        "access-point" => MonitoringStrategy {
            methods: &[ManagementApi, Snmp, Icmp],
            metrics: &["interfaces", "wireless-clients"],
            interval: Duration::from_secs(120),
        },
        "server" => MonitoringStrategy {
            methods: &[Snmp, Icmp],
            metrics: &["resources", "reachability"],
            interval: Duration::from_secs(60),
        },
        "nas" => MonitoringStrategy {
            methods: &[Snmp, Icmp],
            metrics: &["resources", "reachability"],
            interval: Duration::from_secs(300),
        },
        "printer" => MonitoringStrategy {
            methods: &[Snmp, Icmp],
            metrics: &["reachability", "supplies"],
            interval: Duration::from_secs(600),
        },
        "camera" => MonitoringStrategy {
            methods: &[Icmp],
            metrics: &["reachability"],
            interval: Duration::from_secs(300),
        },
        "phone" => MonitoringStrategy {
            methods: &[Icmp],
            metrics: &["reachability"],
            interval: Duration::from_secs(600),
        },
        "iot" => MonitoringStrategy {
            methods: &[Icmp],
            metrics: &["reachability"],
            interval: Duration::from_secs(600),
        },
        _ => MonitoringStrategy {
            methods: &[Icmp],
            metrics: &["reachability"],
            interval: Duration::from_secs(900),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::BUILTIN_SIGNATURES;

    #[test]
    fn test_unknown_gets_most_conservative_strategy() {
        let strategy = monitoring_strategy_for(ROLE_UNKNOWN);
        assert_eq!(strategy.methods, &[ProbeMethod::Icmp]);
        assert_eq!(strategy.interval, Duration::from_secs(900));
    }

    #[test]
    fn test_infrastructure_polled_faster_than_edge_devices() {
        let router = monitoring_strategy_for("router");
        let printer = monitoring_strategy_for("printer");
        let iot = monitoring_strategy_for("iot");

        assert!(router.interval < printer.interval);
        assert!(router.interval < iot.interval);
    }

    #[test]
    fn test_every_signature_role_has_a_dedicated_strategy() {
        let fallback = monitoring_strategy_for(ROLE_UNKNOWN);
        for signature in BUILTIN_SIGNATURES {
            let strategy = monitoring_strategy_for(signature.role);
            assert!(
                strategy.interval < fallback.interval,
                "role {} fell through to the fallback",
                signature.role
            );
            assert!(!strategy.methods.is_empty());
            assert!(!strategy.metrics.is_empty());
        }
    }
}
