//! Role signature table
//!
//! Match patterns for device classification, kept as data so that adding a
//! role or a vendor is a table edit rather than a logic change. Declaration
//! order doubles as tie-break priority: when two signatures score equally,
//! the one declared first wins.

/// Weighted match patterns for one device role
#[derive(Debug)]
pub struct RoleSignature {
    pub role: &'static str,
    /// Substrings matched against the resolved vendor name (lowercase)
    pub vendor_keywords: &'static [&'static str],
    /// Substrings matched against the advertised device type (lowercase)
    pub type_keywords: &'static [&'static str],
    /// Service ports this role typically exposes
    pub expected_ports: &'static [u16],
    /// Substrings matched against collected protocol banners (lowercase)
    pub banner_keywords: &'static [&'static str],
    /// OID-style protocol-class prefixes, the strongest evidence channel
    pub protocol_classes: &'static [&'static str],
}

pub const BUILTIN_SIGNATURES: &[RoleSignature] = &[
    RoleSignature {
        role: "router",
        vendor_keywords: &[
            "mikrotik",
            "routerboard",
            "cisco",
            "juniper",
            "tp-link",
            "netgear",
            "d-link",
            "linksys",
        ],
        type_keywords: &["router", "gateway"],
        expected_ports: &[22, 23, 80, 443, 8291],
        banner_keywords: &["routeros", "mikrotik", "ios "],
        // 14988 = MikroTik, 9 = Cisco, 2636 = Juniper
        protocol_classes: &[
            "1.3.6.1.4.1.14988",
            "1.3.6.1.4.1.9",
            "1.3.6.1.4.1.2636",
        ],
    },
    RoleSignature {
        role: "switch",
        vendor_keywords: &["aruba", "hewlett", "hpe", "extreme", "allied telesis"],
        type_keywords: &["switch", "bridge"],
        expected_ports: &[22, 23, 80],
        banner_keywords: &["procurve", "aruba", "switch"],
        protocol_classes: &["1.3.6.1.4.1.11", "1.3.6.1.4.1.1916"],
    },
    RoleSignature {
        role: "access-point",
        vendor_keywords: &["ubiquiti", "ruckus", "meraki", "unifi", "cambium"],
        type_keywords: &["access point", "access-point", "wireless", "ap"],
        expected_ports: &[22, 80, 443, 8080],
        banner_keywords: &["unifi", "airos", "ruckus"],
        protocol_classes: &["1.3.6.1.4.1.41112", "1.3.6.1.4.1.25053"],
    },
    RoleSignature {
        role: "firewall",
        vendor_keywords: &["fortinet", "palo alto", "checkpoint", "sonicwall", "watchguard"],
        type_keywords: &["firewall", "security appliance", "utm"],
        expected_ports: &[22, 443, 8443],
        banner_keywords: &["fortigate", "pan-os", "sonicos"],
        protocol_classes: &["1.3.6.1.4.1.12356", "1.3.6.1.4.1.25461"],
    },
    RoleSignature {
        role: "server",
        vendor_keywords: &["supermicro", "dell", "vmware", "ibm", "oracle", "intel"],
        type_keywords: &["server", "hypervisor", "virtual machine"],
        expected_ports: &[22, 80, 443, 3389],
        banner_keywords: &["openssh", "apache", "nginx", "microsoft-iis", "esxi"],
        protocol_classes: &["1.3.6.1.4.1.6876", "1.3.6.1.4.1.311"],
    },
    RoleSignature {
        role: "nas",
        vendor_keywords: &["synology", "qnap", "western digital", "seagate", "netgear readynas"],
        type_keywords: &["nas", "storage"],
        expected_ports: &[80, 443, 445, 5000, 5001],
        banner_keywords: &["synology", "diskstation", "qts"],
        protocol_classes: &["1.3.6.1.4.1.6574", "1.3.6.1.4.1.24681"],
    },
    RoleSignature {
        role: "printer",
        vendor_keywords: &["canon", "epson", "brother", "xerox", "ricoh", "lexmark", "kyocera"],
        type_keywords: &["printer", "mfp", "multifunction"],
        expected_ports: &[80, 443, 515, 631, 9100],
        banner_keywords: &["jetdirect", "ipp", "printer"],
        protocol_classes: &["1.3.6.1.2.1.43"],
    },
    RoleSignature {
        role: "camera",
        vendor_keywords: &["hikvision", "dahua", "axis", "reolink", "arlo", "wyze"],
        type_keywords: &["camera", "ipcam", "nvr", "dvr"],
        expected_ports: &[80, 443, 554, 8000, 8554],
        banner_keywords: &["rtsp", "hikvision", "netcam"],
        protocol_classes: &["1.3.6.1.4.1.39165"],
    },
    RoleSignature {
        role: "phone",
        vendor_keywords: &[
            "apple",
            "samsung",
            "xiaomi",
            "oppo",
            "vivo",
            "huawei",
            "oneplus",
            "google",
        ],
        type_keywords: &["phone", "mobile", "smartphone", "tablet"],
        expected_ports: &[],
        banner_keywords: &[],
        protocol_classes: &[],
    },
    RoleSignature {
        role: "iot",
        vendor_keywords: &[
            "espressif",
            "tuya",
            "shelly",
            "sonoff",
            "nest",
            "ring",
            "sonos",
            "broadlink",
        ],
        type_keywords: &["iot", "smart", "sensor", "thermostat", "plug"],
        expected_ports: &[80, 8080],
        banner_keywords: &["esp8266", "esp32", "tasmota"],
        protocol_classes: &[],
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ROLE_UNKNOWN;
    use std::collections::HashSet;

    #[test]
    fn test_roles_are_unique_and_never_unknown() {
        let mut seen = HashSet::new();
        for signature in BUILTIN_SIGNATURES {
            assert!(seen.insert(signature.role), "duplicate role {}", signature.role);
            assert_ne!(signature.role, ROLE_UNKNOWN);
        }
    }

    #[test]
    fn test_table_covers_core_roles() {
        let roles: HashSet<&str> = BUILTIN_SIGNATURES.iter().map(|s| s.role).collect();
        for required in [
            "router",
            "switch",
            "access-point",
            "firewall",
            "server",
            "nas",
            "printer",
            "camera",
            "phone",
            "iot",
        ] {
            assert!(roles.contains(required), "missing role {}", required);
        }
    }

    #[test]
    fn test_keywords_are_lowercase() {
        for signature in BUILTIN_SIGNATURES {
            for keyword in signature
                .vendor_keywords
                .iter()
                .chain(signature.type_keywords)
                .chain(signature.banner_keywords)
            {
                assert_eq!(
                    *keyword,
                    keyword.to_lowercase(),
                    "keyword {:?} in {} must be lowercase",
                    keyword,
                    signature.role
                );
            }
        }
    }
}
