use chrono::{DateTime, Local, TimeZone, Utc};

/// Which of the two historical ISO-8601 renderings a schema uses.
///
/// Both carry millisecond precision; they differ only in how the offset is
/// written. A schema preset fixes one convention for all of its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// UTC with a literal `Z` suffix, e.g. `2013-04-01T19:36:31.207Z`.
    UtcZulu,
    /// Local time with a signed numeric offset, e.g.
    /// `2013-04-01T12:36:31.207-07:00`.
    LocalOffset,
}

/// Render an epoch-millisecond timestamp in the given convention.
///
/// Safe to call concurrently: `chrono` formatting holds no shared mutable
/// state. Any finite timestamp is accepted; the handful of values outside
/// chrono's representable range clamp to the Unix epoch rather than fail.
pub fn format_timestamp(timestamp_millis: i64, format: TimestampFormat) -> String {
    let utc: DateTime<Utc> = match Utc.timestamp_millis_opt(timestamp_millis) {
        chrono::LocalResult::Single(dt) => dt,
        _ => DateTime::UNIX_EPOCH,
    };
    match format {
        TimestampFormat::UtcZulu => utc.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        TimestampFormat::LocalOffset => utc
            .with_timezone(&Local)
            .format("%Y-%m-%dT%H:%M:%S%.3f%:z")
            .to_string(),
    }
}
