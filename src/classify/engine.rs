//! Classification engine
//!
//! Scores discovered devices against the role signature table and persists
//! the winning role. Scoring is additive across independent evidence
//! channels, each capped so no single channel dominates, and fully
//! deterministic: identical evidence always yields the same role and score.

use anyhow::{anyhow, Result};
use serde_json::json;
use std::sync::Arc;

use super::signatures::{RoleSignature, BUILTIN_SIGNATURES};
use crate::models::{DiscoveredDevice, ROLE_UNKNOWN};
use crate::net::normalize_mac;
use crate::storage::Storage;

const VENDOR_WEIGHT: u8 = 20;
const TYPE_WEIGHT: u8 = 25;
const PORT_OVERLAP_CAP: u8 = 20;
const BANNER_WEIGHT: u8 = 15;
const PROTOCOL_PREFIX_WEIGHT: u8 = 30;
const PROTOCOL_EXACT_WEIGHT: u8 = 35;

/// Winners below this total stay `unknown`
const SCORE_FLOOR: u8 = 30;
/// Devices already classified above this score are not re-classified
const CONFIDENT_SCORE: u8 = 70;

/// Outcome of one classification run
#[derive(Debug, Clone)]
pub struct Classification {
    pub role: String,
    /// Winning signature's channel total; the persisted identification
    /// score is separately capped at 100
    pub score: u8,
    /// Nonzero per-role scores, highest first; empty when the run was
    /// skipped for an already-confident device
    pub trace: Vec<(String, u8)>,
}

/// Evidence extracted from a discovered device's fields and metadata
struct Evidence {
    vendor: String,
    advertised_type: String,
    open_ports: Vec<u16>,
    banners: Vec<String>,
    protocol_class: String,
}

pub struct ClassifierEngine {
    storage: Arc<dyn Storage>,
    signatures: &'static [RoleSignature],
}

impl ClassifierEngine {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            signatures: BUILTIN_SIGNATURES,
        }
    }

    /// Swap in an alternate signature table.
    pub fn with_signatures(mut self, signatures: &'static [RoleSignature]) -> Self {
        self.signatures = signatures;
        self
    }

    /// Classify one discovered device addressed by MAC or IP.
    pub async fn classify(&self, target: &str) -> Result<Classification> {
        let (mac, ip) = match normalize_mac(target) {
            Some(mac) => (Some(mac), None),
            None => (None, Some(target.to_string())),
        };

        let device = self
            .storage
            .get_discovered_by_mac_or_ip(mac.as_deref(), ip.as_deref())
            .await?
            .ok_or_else(|| anyhow!("No discovered device matches '{}'", target))?;

        self.classify_device(device).await
    }

    /// Re-classify every discovered device, tolerating per-device failures.
    /// Returns the number of devices classified.
    pub async fn reclassify_all(&self) -> Result<usize> {
        let devices = self
            .storage
            .list_discovered_devices(&Default::default())
            .await?;

        let mut classified = 0;
        for device in devices {
            let mac = device.mac.clone();
            match self.classify_device(device).await {
                Ok(outcome) => {
                    tracing::debug!("Classified {} as {} ({})", mac, outcome.role, outcome.score);
                    classified += 1;
                }
                Err(e) => {
                    tracing::warn!("Classification failed for {}: {}", mac, e);
                }
            }
        }

        tracing::info!("Reclassification pass finished: {} devices", classified);
        Ok(classified)
    }

    async fn classify_device(&self, mut device: DiscoveredDevice) -> Result<Classification> {
        if device.role != ROLE_UNKNOWN && device.identification_score > CONFIDENT_SCORE {
            tracing::debug!(
                "Skipping {}: already {} at score {}",
                device.mac,
                device.role,
                device.identification_score
            );
            return Ok(Classification {
                role: device.role.clone(),
                score: device.identification_score,
                trace: Vec::new(),
            });
        }

        let evidence = evidence_from(&device);
        let outcome = evaluate(&evidence, self.signatures);

        device.role = outcome.role.clone();
        device.is_identified = outcome.role != ROLE_UNKNOWN;
        device.absorb_score(outcome.score);

        let trace: Vec<serde_json::Value> = outcome
            .trace
            .iter()
            .map(|(role, score)| json!({"role": role, "score": score}))
            .collect();
        device.merge_metadata(&json!({
            "classification": {
                "role": outcome.role,
                "score": outcome.score,
                "trace": trace,
                "classified_at": chrono::Utc::now().to_rfc3339(),
            }
        }));

        self.storage.upsert_discovered_device(&device).await?;
        Ok(outcome)
    }
}

/// Score every signature against the evidence and pick the winner.
///
/// Ties resolve to the signature declared first; a winner below the floor
/// resolves to `unknown` while its score trace is still reported.
fn evaluate(evidence: &Evidence, signatures: &[RoleSignature]) -> Classification {
    let mut trace: Vec<(String, u8)> = Vec::new();
    let mut winner: Option<(&RoleSignature, u8)> = None;

    for signature in signatures {
        let score = score_signature(signature, evidence);
        if score > 0 {
            trace.push((signature.role.to_string(), score));
        }
        // Strict comparison keeps the first declaration on ties.
        if score > winner.map_or(0, |(_, s)| s) {
            winner = Some((signature, score));
        }
    }

    trace.sort_by(|a, b| b.1.cmp(&a.1));

    match winner {
        Some((signature, score)) if score >= SCORE_FLOOR => Classification {
            role: signature.role.to_string(),
            score,
            trace,
        },
        Some((_, score)) => Classification {
            role: ROLE_UNKNOWN.to_string(),
            score,
            trace,
        },
        None => Classification {
            role: ROLE_UNKNOWN.to_string(),
            score: 0,
            trace,
        },
    }
}

fn score_signature(signature: &RoleSignature, evidence: &Evidence) -> u8 {
    let mut score = 0u8;

    if !evidence.vendor.is_empty() && contains_any(&evidence.vendor, signature.vendor_keywords) {
        score += VENDOR_WEIGHT;
    }
    if !evidence.advertised_type.is_empty()
        && contains_any(&evidence.advertised_type, signature.type_keywords)
    {
        score += TYPE_WEIGHT;
    }
    score += port_overlap_score(signature.expected_ports, &evidence.open_ports);
    if evidence
        .banners
        .iter()
        .any(|banner| contains_any(banner, signature.banner_keywords))
    {
        score += BANNER_WEIGHT;
    }
    score += protocol_class_score(signature.protocol_classes, &evidence.protocol_class);

    score
}

/// Fraction of the signature's expected ports observed open, scaled to the
/// channel cap.
fn port_overlap_score(expected: &[u16], observed: &[u16]) -> u8 {
    if expected.is_empty() || observed.is_empty() {
        return 0;
    }
    let matched = expected.iter().filter(|p| observed.contains(p)).count();
    ((PORT_OVERLAP_CAP as usize * matched) / expected.len()) as u8
}

/// Exact protocol-class match scores higher than a prefix match.
fn protocol_class_score(classes: &[&str], observed: &str) -> u8 {
    if observed.is_empty() {
        return 0;
    }
    if classes.iter().any(|c| *c == observed) {
        return PROTOCOL_EXACT_WEIGHT;
    }
    if classes.iter().any(|c| observed.starts_with(c)) {
        return PROTOCOL_PREFIX_WEIGHT;
    }
    0
}

fn contains_any(s: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| s.contains(p))
}

fn evidence_from(device: &DiscoveredDevice) -> Evidence {
    let meta = &device.metadata;

    let advertised_type = meta
        .get("advertised_type")
        .or_else(|| meta.get("device_type"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_lowercase();

    let open_ports: Vec<u16> = meta
        .get("open_ports")
        .and_then(|v| v.as_array())
        .map(|ports| {
            ports
                .iter()
                .filter_map(|p| p.as_u64())
                .filter(|p| *p <= u16::MAX as u64)
                .map(|p| p as u16)
                .collect()
        })
        .unwrap_or_default();

    let mut banners: Vec<String> = Vec::new();
    if let Some(banner) = meta.get("banner").and_then(|v| v.as_str()) {
        banners.push(banner.to_lowercase());
    }
    if let Some(list) = meta.get("banners").and_then(|v| v.as_array()) {
        banners.extend(list.iter().filter_map(|b| b.as_str()).map(str::to_lowercase));
    }

    Evidence {
        vendor: device
            .vendor
            .as_deref()
            .unwrap_or("")
            .to_lowercase(),
        advertised_type,
        open_ports,
        banners,
        protocol_class: meta
            .get("protocol_class")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
    }
}
