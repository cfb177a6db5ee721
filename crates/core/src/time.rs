use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

// Naive timestamps (no offset) are treated as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Parses a backend timestamp. Accepts RFC 3339, the common naive ISO forms
/// and bare dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Human-readable form of a backend timestamp; unparseable text is shown as-is.
pub fn display_timestamp(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(dt) => dt.format(DISPLAY_FORMAT).to_string(),
        None => raw.trim().to_string(),
    }
}

/// Coarse age of a backend timestamp relative to `now`, e.g. `3h ago`.
/// Timestamps in the future read as just now.
pub fn relative_age(raw: &str, now: DateTime<Utc>) -> Option<String> {
    let then = parse_timestamp(raw)?;
    let hours = (now - then).num_hours();
    Some(match hours {
        h if h < 1 => "Just now".to_string(),
        h if h < 24 => format!("{h}h ago"),
        h if h < 48 => "1 day ago".to_string(),
        h => format!("{} days ago", h / 24),
    })
}
