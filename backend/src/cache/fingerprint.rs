//! Content fingerprints used as cache key components.
//!
//! Keys must change whenever an input that affects the cached result changes,
//! so locations and target sets are keyed by a digest of their contents
//! rather than by id alone.

use sha2::{Digest, Sha256};
use std::fmt::Write;

use crate::api::{ImagingCriteria, Location, Target};

/// Calculate SHA-256 checksum of `content`.
///
/// # Returns
/// Hexadecimal string representation of the SHA-256 hash.
pub fn calculate_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

/// First eight bytes of the SHA-256 digest of `content`.
fn short_digest(content: &str) -> u64 {
    let digest = Sha256::digest(content.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Tag identifying a location together with every field that affects results.
pub fn location_tag(location: &Location) -> u64 {
    let mut content = format!(
        "{}|{:x}|{:x}|{}|{:x}|{}",
        location.id,
        location.latitude.to_bits(),
        location.longitude.to_bits(),
        location.timezone,
        location.altitude_threshold.to_bits(),
        location.active,
    );
    for point in location.horizon_mask().points() {
        let _ = write!(content, "|{:x}:{:x}", point.azimuth.to_bits(), point.altitude.to_bits());
    }
    short_digest(&content)
}

/// Version of a single target's coordinates.
pub fn target_version(target: &Target) -> u64 {
    short_digest(&format!(
        "{}|{:x}|{:x}",
        target.id,
        target.ra_hours.to_bits(),
        target.dec_degrees.to_bits()
    ))
}

/// Fingerprint of the enabled targets of a batch, independent of input order.
pub fn target_set_fingerprint(targets: &[Target]) -> String {
    let mut enabled: Vec<&Target> = targets.iter().filter(|t| t.enabled).collect();
    enabled.sort_by_key(|t| t.id);

    let mut content = String::new();
    for target in enabled {
        let _ = write!(
            content,
            "{}:{:x}:{:x};",
            target.id,
            target.ra_hours.to_bits(),
            target.dec_degrees.to_bits()
        );
    }
    calculate_checksum(&content)
}

/// Fingerprint of a scan request's filtering parameters.
pub fn criteria_fingerprint(criteria: &ImagingCriteria, limit: Option<usize>) -> String {
    calculate_checksum(&format!(
        "{}|{:x}|{:x}|{:x}|{:?}",
        criteria.min_observable_minutes,
        criteria.min_max_altitude.to_bits(),
        criteria.max_moon_illumination.to_bits(),
        criteria.min_moon_separation.to_bits(),
        limit
    ))
}
