use serde_json::{Map, Value};

/// Parse a `key:value,key:value` user-field string into ordered pairs.
///
/// Only the first colon of each pair separates key from value, so values may
/// themselves contain colons. A pair with no colon, or with an empty key, is
/// skipped.
pub fn parse(spec: &str) -> Vec<(String, String)> {
    spec.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once(':')?;
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Merge user fields from both configuration sources into `doc`.
///
/// The configured value is applied first, then the override value, so the
/// override wins on key collision. This ordering is load-bearing: the
/// override channel is the process-wide property documented in
/// [`crate::env::USER_FIELDS_ENV`].
pub fn apply(doc: &mut Map<String, Value>, configured: Option<&str>, overriding: Option<&str>) {
    for source in [configured, overriding].into_iter().flatten() {
        for (key, value) in parse(source) {
            doc.insert(key, Value::String(value));
        }
    }
}
