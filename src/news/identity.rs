use sha2::{Digest, Sha256};

use crate::util::canonicalize_link;

/// Number of hex characters kept from the link digest.
pub const ID_LEN: usize = 16;

/// Content-addressed record id: a truncated SHA-256 of the canonical link.
///
/// Links that differ only in fragment or tracking parameters share an id.
pub fn record_id(link: &str) -> String {
    let canonical = canonicalize_link(link);
    let hash = Sha256::digest(canonical.as_bytes());
    let mut hex = format!("{:x}", hash);
    hex.truncate(ID_LEN);
    hex
}
