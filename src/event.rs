use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A logging event as handed over by the host framework, read-only for the
/// duration of one formatting call.
#[derive(Debug, Clone)]
pub struct LogEvent {
    /// Event time in epoch milliseconds.
    pub timestamp_millis: i64,
    /// Canonical severity string, e.g. `INFO`.
    pub level: String,
    pub message: Message,
    pub logger_name: Option<String>,
    pub thread_name: Option<String>,
    pub call_site: Option<CallSite>,
    /// Mapped diagnostic context. Values may themselves be objects.
    pub mdc: BTreeMap<String, serde_json::Value>,
    /// Nested diagnostic context, rendered to one string by the host.
    pub ndc: Option<String>,
    pub error: Option<ThrownError>,
}

impl LogEvent {
    pub fn new(timestamp_millis: i64, level: impl Into<String>, message: Message) -> Self {
        LogEvent {
            timestamp_millis,
            level: level.into(),
            message,
            logger_name: None,
            thread_name: None,
            call_site: None,
            mdc: BTreeMap::new(),
            ndc: None,
            error: None,
        }
    }
}

/// Call-site metadata. Hosting frameworks cannot always supply every part,
/// so each field is individually optional; absent parts are omitted from
/// output rather than defaulted.
#[derive(Debug, Clone, Serialize)]
pub struct CallSite {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub class: Option<String>,
    pub method: Option<String>,
}

/// An error attached to a logging event: canonical type name when
/// resolvable, optional message, and pre-rendered stack frames.
#[derive(Debug, Clone, Serialize)]
pub struct ThrownError {
    pub class_name: Option<String>,
    pub message: Option<String>,
    pub stack_frames: Vec<String>,
}

/// The message payload of an event.
///
/// Most events carry plain text. A payload that implements
/// [`StructuredMessage`] can instead be expanded field-by-field into the
/// output document when the layout opts in; see
/// [`crate::layout::JsonEventLayout::set_render_structured`].
#[derive(Clone)]
pub enum Message {
    Text(String),
    Structured(Arc<dyn StructuredMessage>),
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Message::Text(text.into())
    }

    /// The plain rendering of the payload, used whenever structured
    /// expansion is disabled or fails.
    pub fn rendered(&self) -> String {
        match self {
            Message::Text(text) => text.clone(),
            Message::Structured(payload) => payload.to_string(),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Message::Structured(payload) => {
                f.debug_tuple("Structured").field(&payload.to_string()).finish()
            }
        }
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::Text(text.to_string())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::Text(text)
    }
}

/// Capability contract for message payloads that expose their contents as
/// an ordered key/value sequence.
///
/// `Display` supplies the fallback rendering emitted under the message key
/// when expansion is disabled or [`entries`](StructuredMessage::entries)
/// fails.
pub trait StructuredMessage: fmt::Display + Send + Sync {
    fn entries(&self) -> Result<Vec<(String, serde_json::Value)>, StructuredMessageError>;
}

/// Error raised when a structured payload cannot enumerate its fields.
/// The layout recovers by falling back to the plain rendering.
#[derive(Debug, thiserror::Error)]
#[error("structured message expansion failed: {0}")]
pub struct StructuredMessageError(pub String);

/// Structured message backed by a JSON object. Renders as the compact JSON
/// text of the object.
#[derive(Debug, Clone)]
pub struct ObjectMessage(pub serde_json::Map<String, serde_json::Value>);

impl fmt::Display for ObjectMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::Value::Object(self.0.clone()))
    }
}

impl StructuredMessage for ObjectMessage {
    fn entries(&self) -> Result<Vec<(String, serde_json::Value)>, StructuredMessageError> {
        Ok(self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_message_renders_verbatim() {
        assert_eq!(Message::text("hello").rendered(), "hello");
    }

    #[test]
    fn object_message_exposes_ordered_entries() {
        let mut map = serde_json::Map::new();
        map.insert("a".to_string(), json!(1));
        map.insert("b".to_string(), json!("two"));
        let entries = ObjectMessage(map).entries().unwrap();
        assert_eq!(entries[0].0, "a");
        assert_eq!(entries[1], ("b".to_string(), json!("two")));
    }

    #[test]
    fn object_message_renders_as_json_text() {
        let mut map = serde_json::Map::new();
        map.insert("a".to_string(), json!(1));
        let message = Message::Structured(Arc::new(ObjectMessage(map)));
        assert_eq!(message.rendered(), "{\"a\":1}");
    }
}
