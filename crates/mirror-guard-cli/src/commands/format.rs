use mirror_guard::DetectionResult;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Render epoch seconds as an RFC 3339 UTC timestamp.
pub fn timestamp(epoch_secs: u64) -> String {
    i64::try_from(epoch_secs)
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_else(|| epoch_secs.to_string())
}

pub fn datetime(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// Human-readable byte count.
pub fn size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

pub fn print_detection(result: &DetectionResult) {
    println!("{}", result.summary());
    for branch in result.affected_branches() {
        println!("  {branch}");
    }
}
