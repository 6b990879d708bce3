//! Version ordering for published bundle versions
//!
//! Versions are opaque strings owned by the source. Semver-like strings
//! (`1.2`, `v1.2.3`) compare numerically; anything else only compares
//! for equality.

use semver::Version;

/// Parse a version leniently, padding missing minor/patch components
fn lenient(version: &str) -> Option<Version> {
    let v = version.trim().trim_start_matches('v');
    if let Ok(parsed) = Version::parse(v) {
        return Some(parsed);
    }

    let parts: Vec<&str> = v.split('.').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part.parse().ok()?;
    }
    Some(Version::new(numbers[0], numbers[1], numbers[2]))
}

/// Whether `candidate` should replace `current`
pub fn is_newer(candidate: &str, current: &str) -> bool {
    match (lenient(candidate), lenient(current)) {
        (Some(a), Some(b)) => a > b,
        _ => candidate != current,
    }
}
