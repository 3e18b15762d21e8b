/// Environment variable names used by this crate for process-wide
/// configuration of the layout.
///
/// These are purely helpers; the core layout types remain decoupled from
/// environment access except where noted on [`crate::layout::JsonEventLayout`].

/// Process-wide user fields in `key:value,key:value` form.
///
/// Read on every formatting call and applied after the layout's own
/// user-field string, so values from this variable win on key collision.
pub const USER_FIELDS_ENV: &str = "JSON_EVENT_LAYOUT_USER_FIELDS";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
