//! Version comparison used by dependency resolution and update checks.
//!
//! Versions are compared segment by segment on their leading digits only:
//! `v1.2.3` equals `1.2.3`, `1.0` equals `1.0.0`, and `1.0.0-beta` equals
//! `1.0.0`. Pre-release suffixes carry no precedence.

use std::cmp::Ordering;

/// Compare two version strings.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = numeric_segments(a);
    let right = numeric_segments(b);
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// True when `candidate` is strictly newer than `current`.
pub fn is_newer(current: &str, candidate: &str) -> bool {
    compare_versions(current, candidate) == Ordering::Less
}

/// Pick the higher of two requested versions. An empty request means
/// "latest" and yields to any concrete version; ties keep `current`.
pub fn higher_version<'a>(current: &'a str, candidate: &'a str) -> &'a str {
    if current.is_empty() {
        return candidate;
    }
    if candidate.is_empty() {
        return current;
    }
    if is_newer(current, candidate) {
        candidate
    } else {
        current
    }
}

fn numeric_segments(version: &str) -> Vec<u64> {
    let trimmed = version.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Vec::new();
    }

    trimmed
        .split('.')
        .map(|segment| {
            let digits: String = segment.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<u64>().unwrap_or(0)
        })
        .collect()
}
