use chrono::{DateTime, SecondsFormat, Utc};

/// Generate a new random ID (UUIDv4, no dashes).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string().replace('-', "")
}

/// Get the current time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    format_rfc3339(Utc::now())
}

/// Format a UTC instant as fixed-width RFC 3339 (microseconds, `Z` suffix).
///
/// The width never varies, so stored timestamps sort correctly as plain text.
pub fn format_rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
