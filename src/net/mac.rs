//! MAC address normalization and OUI helpers

/// Normalize a MAC address to lowercase colon-hex (`aa:bb:cc:dd:ee:ff`).
///
/// Accepts colon, dash and dot separated forms as well as bare hex.
/// Returns `None` for anything that does not contain exactly 12 hex digits.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let hex: String = raw
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect::<String>()
        .to_lowercase();

    if hex.len() != 12 {
        return None;
    }
    // Reject inputs with stray non-separator characters (e.g. hostnames)
    if raw
        .chars()
        .any(|c| !c.is_ascii_hexdigit() && !matches!(c, ':' | '-' | '.'))
    {
        return None;
    }

    let pairs: Vec<&str> = (0..6).map(|i| &hex[i * 2..i * 2 + 2]).collect();
    Some(pairs.join(":"))
}

/// First three octets as a bare uppercase hex prefix (`AABBCC`), the key
/// format used by the vendor cache.
pub fn oui_prefix(mac: &str) -> Option<String> {
    let hex: String = mac
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .take(6)
        .collect();
    if hex.len() < 6 {
        return None;
    }
    Some(hex.to_uppercase())
}

/// Check if a MAC address is locally administered (randomized/virtual).
///
/// Bit 2 of the first byte indicates locally administered:
/// - 0 = Universally Administered (real hardware)
/// - 1 = Locally Administered (virtual/randomized)
pub fn is_locally_administered(mac: &str) -> bool {
    let first: String = mac
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .take(2)
        .collect();

    if first.len() < 2 {
        return false;
    }

    match u8::from_str_radix(&first, 16) {
        Ok(byte) => (byte & 0x02) != 0,
        Err(_) => false,
    }
}

/// Placeholder key for sightings that carried no hardware address.
pub fn sentinel_mac(ip: &str) -> String {
    format!("unknown_{}", ip)
}

/// True for keys produced by [`sentinel_mac`].
pub fn is_sentinel_mac(mac: &str) -> bool {
    mac.starts_with("unknown_")
}
