//! Interface health scoring
//!
//! Pure scoring of interface counters into a 0-100 health score with a
//! severity bucket and human-readable findings. No I/O, no clock.

use serde::{Deserialize, Serialize};

/// Per-channel deduction caps so one noisy counter cannot dominate
const TX_ERROR_CAP: u64 = 30;
const RX_ERROR_CAP: u64 = 30;
const TX_DROP_CAP: u64 = 20;
const RX_DROP_CAP: u64 = 20;
const LINK_DOWN_CAP: u64 = 40;

/// Raw counters sampled from one interface
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterfaceCounters {
    pub name: String,
    /// Interface is administratively disabled
    pub admin_down: bool,
    /// Interface reports an active link
    pub oper_up: bool,
    pub tx_errors: u64,
    pub rx_errors: u64,
    pub tx_drops: u64,
    pub rx_drops: u64,
    /// Link flap events since counters were last reset
    pub link_downs: u64,
}

/// Health severity buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Perfect,
    Good,
    Moderate,
    Concerning,
    Poor,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Perfect => "perfect",
            HealthStatus::Good => "good",
            HealthStatus::Moderate => "moderate",
            HealthStatus::Concerning => "concerning",
            HealthStatus::Poor => "poor",
            HealthStatus::Critical => "critical",
        }
    }

    fn for_score(score: u8) -> Self {
        match score {
            100 => HealthStatus::Perfect,
            90..=99 => HealthStatus::Good,
            70..=89 => HealthStatus::Moderate,
            50..=69 => HealthStatus::Concerning,
            20..=49 => HealthStatus::Poor,
            _ => HealthStatus::Critical,
        }
    }
}

/// Scored health for one interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceHealth {
    pub score: u8,
    pub status: HealthStatus,
    pub findings: Vec<String>,
}

/// Score one interface's counters.
///
/// A down interface scores 0 outright. Otherwise the score starts at 100 and
/// each counter deducts up to its cap: 2 per error (cap 30 per direction),
/// 1 per drop (cap 20 per direction), 10 per link-down event (cap 40).
pub fn score_interface(counters: &InterfaceCounters) -> InterfaceHealth {
    if counters.admin_down {
        return InterfaceHealth {
            score: 0,
            status: HealthStatus::Critical,
            findings: vec!["interface administratively disabled".to_string()],
        };
    }
    if !counters.oper_up {
        return InterfaceHealth {
            score: 0,
            status: HealthStatus::Critical,
            findings: vec!["interface link is down".to_string()],
        };
    }

    let mut findings = Vec::new();
    let mut deduction: u64 = 0;

    deduction += counters.tx_errors.saturating_mul(2).min(TX_ERROR_CAP);
    if counters.tx_errors > 0 {
        findings.push(format!("transmit errors: {}", counters.tx_errors));
    }

    deduction += counters.rx_errors.saturating_mul(2).min(RX_ERROR_CAP);
    if counters.rx_errors > 0 {
        findings.push(format!("receive errors: {}", counters.rx_errors));
    }

    deduction += counters.tx_drops.min(TX_DROP_CAP);
    if counters.tx_drops > 0 {
        findings.push(format!("transmit drops: {}", counters.tx_drops));
    }

    deduction += counters.rx_drops.min(RX_DROP_CAP);
    if counters.rx_drops > 0 {
        findings.push(format!("receive drops: {}", counters.rx_drops));
    }

    deduction += counters.link_downs.saturating_mul(10).min(LINK_DOWN_CAP);
    if counters.link_downs > 0 {
        findings.push(format!("link down events: {}", counters.link_downs));
    }

    if findings.is_empty() {
        findings.push("no issues detected".to_string());
    }

    let score = 100u64.saturating_sub(deduction) as u8;

    InterfaceHealth {
        score,
        status: HealthStatus::for_score(score),
        findings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(name: &str) -> InterfaceCounters {
        InterfaceCounters {
            name: name.to_string(),
            admin_down: false,
            oper_up: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_admin_down_scores_zero_critical() {
        let mut counters = clean("ether1");
        counters.admin_down = true;

        let health = score_interface(&counters);
        assert_eq!(health.score, 0);
        assert_eq!(health.status, HealthStatus::Critical);
        assert_eq!(health.findings.len(), 1);
    }

    #[test]
    fn test_oper_down_scores_zero_critical() {
        let mut counters = clean("ether2");
        counters.oper_up = false;

        let health = score_interface(&counters);
        assert_eq!(health.score, 0);
        assert_eq!(health.status, HealthStatus::Critical);
        assert_eq!(health.findings, vec!["interface link is down"]);
    }

    #[test]
    fn test_clean_interface_is_perfect_with_single_finding() {
        let health = score_interface(&clean("ether3"));
        assert_eq!(health.score, 100);
        assert_eq!(health.status, HealthStatus::Perfect);
        assert_eq!(health.findings, vec!["no issues detected"]);
    }

    #[test]
    fn test_error_deduction_caps() {
        let mut counters = clean("ether4");
        counters.tx_errors = 1_000_000;

        let health = score_interface(&counters);
        assert_eq!(health.score, 70, "tx error deduction caps at 30");
        assert_eq!(health.status, HealthStatus::Moderate);
    }

    #[test]
    fn test_link_down_deduction_caps() {
        let mut counters = clean("ether5");
        counters.link_downs = 9;

        let health = score_interface(&counters);
        assert_eq!(health.score, 60, "link-down deduction caps at 40");
        assert_eq!(health.status, HealthStatus::Concerning);
    }

    #[test]
    fn test_combined_deductions_clamp_at_zero() {
        let counters = InterfaceCounters {
            name: "ether6".to_string(),
            admin_down: false,
            oper_up: true,
            tx_errors: 1000,
            rx_errors: 1000,
            tx_drops: 1000,
            rx_drops: 1000,
            link_downs: 1000,
        };

        let health = score_interface(&counters);
        assert_eq!(health.score, 0, "total deduction 140 clamps to 0");
        assert_eq!(health.status, HealthStatus::Critical);
        assert_eq!(health.findings.len(), 5);
    }

    #[test]
    fn test_bucket_boundaries() {
        // One link flap: 100 - 10 = 90, lowest "good".
        let mut counters = clean("ether7");
        counters.link_downs = 1;
        assert_eq!(score_interface(&counters).status, HealthStatus::Good);

        // One flap plus one rx drop lands on 89, the top of "moderate".
        let mut counters = clean("ether8");
        counters.link_downs = 1;
        counters.rx_drops = 1;
        let health = score_interface(&counters);
        assert_eq!(health.score, 89);
        assert_eq!(health.status, HealthStatus::Moderate);
    }
}
