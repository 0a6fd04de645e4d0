//! Network helpers: MAC normalization, reverse DNS, subnet expansion

pub mod dns;
pub mod mac;
pub mod subnet;

pub use dns::{resolve_hostname, reverse_lookup};
pub use mac::{is_locally_administered, is_sentinel_mac, normalize_mac, oui_prefix, sentinel_mac};
pub use subnet::expand_cidr;
