//! Quota accounting.
//!
//! Usage is derived, never stored: a recursive size walk of the tenant's
//! directory compared against the account ceiling. A separate single-write
//! ceiling bounds any individual upload regardless of quota headroom.

use std::fs;
use std::path::Path;

use crate::error::QuotaError;

const MIB: f64 = 1024.0 * 1024.0;

/// Fallback single-write ceiling when the configured value is unparseable.
const DEFAULT_UPLOAD_LIMIT_MIB: f64 = 150.0;

/// Recursive sum of file sizes under `dir`. Entries that vanish mid-walk
/// contribute zero; a missing directory is simply empty.
pub fn disk_usage(dir: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    let mut total = 0u64;
    for entry in entries.flatten() {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if metadata.is_dir() {
            total += disk_usage(&entry.path());
        } else if metadata.is_file() {
            total += metadata.len();
        }
    }
    total
}

/// Pre-write quota gate. `existing` is the size of the file being
/// overwritten (zero for new files) so rewrites are not double-counted.
/// A `quota` of `None` (owner) always passes.
pub fn check_write(
    used: u64,
    existing: u64,
    quota: Option<u64>,
    incoming: u64,
) -> Result<(), QuotaError> {
    let Some(limit) = quota else {
        return Ok(());
    };

    let projected = used.saturating_sub(existing).saturating_add(incoming);
    if projected > limit {
        return Err(QuotaError::QuotaExceeded {
            attempted: incoming,
            limit,
        });
    }
    Ok(())
}

/// Single-write ceiling gate, applied before quota.
pub fn check_upload_size(incoming: u64, limit: u64) -> Result<(), QuotaError> {
    if incoming > limit {
        return Err(QuotaError::FileTooLarge {
            attempted: incoming,
            limit,
        });
    }
    Ok(())
}

/// Parses a human-readable size limit into bytes. Accepts "2GB", "150MB",
/// "512KB", "1000bytes"; a bare number is interpreted as MiB. Unparseable
/// values fall back to 150 MiB.
pub fn parse_size_limit(value: &str) -> u64 {
    let v = value.trim().to_ascii_lowercase();

    let (number, scale) = if let Some(n) = v.strip_suffix("bytes") {
        (n, 1.0)
    } else if let Some(n) = v.strip_suffix("gb") {
        (n, MIB * 1024.0)
    } else if let Some(n) = v.strip_suffix("mb") {
        (n, MIB)
    } else if let Some(n) = v.strip_suffix("kb") {
        (n, 1024.0)
    } else {
        (v.as_str(), MIB)
    };

    match number.trim().parse::<f64>() {
        Ok(n) if n >= 0.0 => (n * scale) as u64,
        _ => (DEFAULT_UPLOAD_LIMIT_MIB * MIB) as u64,
    }
}
