use std::path::{Path, PathBuf};

use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::strategy::EnvOverrides;

/// Backup root used when neither configuration nor environment names one.
pub const DEFAULT_BACKUP_ROOT: &str = "data/repo-backups";

/// File extension of snapshot bundles.
pub const BUNDLE_EXTENSION: &str = "bundle";

/// Make an untrusted value safe to use as a single path segment.
///
/// Every character outside `[A-Za-z0-9._-]` becomes `_`, so separators can
/// never survive. Empty and all-dot results are replaced as well, since `.`
/// and `..` would still escape the directory they are joined onto.
pub fn sanitize_segment(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.chars().all(|c| c == '.') {
        "_".repeat(cleaned.len().max(1))
    } else {
        cleaned
    }
}

/// Resolve the directory all snapshots live under.
///
/// Order: configured directory (relative paths are taken from `cwd`),
/// then the environment override, then [`DEFAULT_BACKUP_ROOT`] under `cwd`.
pub fn resolve_backup_root(configured: Option<&str>, env: &EnvOverrides, cwd: &Path) -> PathBuf {
    let chosen = configured
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| env.backup_directory.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_ROOT));

    if chosen.is_absolute() {
        chosen
    } else {
        cwd.join(chosen)
    }
}

/// Directory holding the snapshots of one repository:
/// `<root>/<user>/<owner>/<repo>`.
pub fn repository_backup_dir(root: &Path, user_id: &str, owner: &str, repo: &str) -> PathBuf {
    root.join(sanitize_segment(user_id))
        .join(sanitize_segment(owner))
        .join(sanitize_segment(repo))
}

/// File name for a snapshot taken at `at`, e.g. `2026-10-17T08-30-00-123Z.bundle`.
///
/// Millisecond precision and fixed-width fields keep lexical order equal
/// to chronological order.
pub fn bundle_file_name(at: OffsetDateTime) -> String {
    let at = at.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}-{:02}-{:02}-{:03}Z.{BUNDLE_EXTENSION}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second(),
        at.millisecond(),
    )
}

/// Creation time encoded in a name produced by [`bundle_file_name`].
///
/// `None` for any other name, including bundles dropped in by hand.
pub fn parse_bundle_file_name(name: &str) -> Option<OffsetDateTime> {
    let stamp = name.strip_suffix(BUNDLE_EXTENSION)?.strip_suffix("Z.")?;
    let bytes = stamp.as_bytes();
    if bytes.len() != 23 {
        return None;
    }
    for (idx, sep) in [(4, b'-'), (7, b'-'), (10, b'T'), (13, b'-'), (16, b'-'), (19, b'-')] {
        if bytes[idx] != sep {
            return None;
        }
    }
    let field = |range: std::ops::Range<usize>| -> Option<u16> {
        let digits = stamp.get(range)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    };

    let year = i32::from(field(0..4)?);
    let month = Month::try_from(u8::try_from(field(5..7)?).ok()?).ok()?;
    let day = u8::try_from(field(8..10)?).ok()?;
    let hour = u8::try_from(field(11..13)?).ok()?;
    let minute = u8::try_from(field(14..16)?).ok()?;
    let second = u8::try_from(field(17..19)?).ok()?;
    let millisecond = field(20..23)?;

    let date = Date::from_calendar_date(year, month, day).ok()?;
    let time = Time::from_hms_milli(hour, minute, second, millisecond).ok()?;
    Some(PrimitiveDateTime::new(date, time).assume_utc())
}

/// True if `path` looks like a snapshot written by this crate.
pub fn is_bundle_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(BUNDLE_EXTENSION)
}
