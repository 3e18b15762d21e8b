use std::sync::OnceLock;

/// Emitted in place of the host name when the local machine identity
/// cannot be resolved.
pub const FALLBACK_HOST: &str = "unknown-host";

/// Resolve the local host name, memoized for the lifetime of the process.
///
/// Never fails: resolution errors and non-UTF-8 host names both degrade to
/// [`FALLBACK_HOST`].
pub fn resolve() -> &'static str {
    static HOST: OnceLock<String> = OnceLock::new();
    HOST.get_or_init(|| {
        hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| FALLBACK_HOST.to_string())
    })
}
