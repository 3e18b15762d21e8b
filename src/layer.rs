use crate::event::{CallSite, LogEvent, Message, ThrownError};
use crate::layout::JsonEventLayout;
use chrono::Utc;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns every observed event into a
/// [`LogEvent`], encodes it through a [`JsonEventLayout`] and writes the
/// resulting line through a [`MakeWriter`].
///
/// Encoding happens on the emitting thread; the layout holds no per-call
/// state, so one layer instance serves all application threads.
pub struct JsonEventLayer<W> {
    layout: JsonEventLayout,
    make_writer: W,
}

impl<W> JsonEventLayer<W>
where
    W: for<'w> MakeWriter<'w> + 'static,
{
    pub fn new(layout: JsonEventLayout, make_writer: W) -> Self {
        JsonEventLayer { layout, make_writer }
    }

    pub fn layout(&self) -> &JsonEventLayout {
        &self.layout
    }
}

impl<S, W> Layer<S> for JsonEventLayer<W>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;
        let mut error: Option<ThrownError> = None;

        let mut visitor = EventVisitor {
            fields: &mut fields,
            message: &mut message,
            error: &mut error,
        };
        event.record(&mut visitor);

        let meta = event.metadata();
        let log_event = LogEvent {
            timestamp_millis: Utc::now().timestamp_millis(),
            level: meta.level().to_string(),
            message: Message::Text(message.unwrap_or_default()),
            logger_name: Some(meta.target().to_string()),
            thread_name: std::thread::current().name().map(|name| name.to_string()),
            call_site: call_site_of(meta),
            mdc: fields,
            ndc: None,
            error,
        };

        match self.layout.format(&log_event) {
            Ok(line) => {
                let mut writer = self.make_writer.make_writer();
                if let Err(e) = writer.write_all(line.as_bytes()) {
                    eprintln!("error writing log line: {}", e);
                }
            }
            Err(e) => eprintln!("error encoding log event: {}", e),
        }
    }
}

/// Call-site metadata from tracing, when the compiler supplied it.
/// tracing has no notion of an enclosing function name, so `method` stays
/// empty and is omitted from output.
fn call_site_of(meta: &tracing::Metadata<'_>) -> Option<CallSite> {
    if meta.file().is_none() && meta.line().is_none() && meta.module_path().is_none() {
        return None;
    }
    Some(CallSite {
        file: meta.file().map(|file| file.to_string()),
        line: meta.line(),
        class: meta.module_path().map(|path| path.to_string()),
        method: None,
    })
}

pub struct EventVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
    pub error: &'a mut Option<ThrownError>,
}

impl<'a> EventVisitor<'a> {
    fn insert(&mut self, field: &tracing::field::Field, value: serde_json::Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl<'a> tracing::field::Visit for EventVisitor<'a> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.insert(field, serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.insert(field, serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.insert(field, serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.insert(field, serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &tracing::field::Field, value: &(dyn std::error::Error + 'static)) {
        // The source chain doubles as pre-rendered stack frames.
        let mut frames = Vec::new();
        let mut cause = value.source();
        while let Some(err) = cause {
            frames.push(err.to_string());
            cause = err.source();
        }
        let thrown = ThrownError {
            class_name: None,
            message: Some(value.to_string()),
            stack_frames: frames,
        };
        if field.name() == "error" {
            *self.error = Some(thrown);
        } else {
            self.insert(field, serde_json::Value::String(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.insert(field, serde_json::Value::String(format!("{:?}", value)));
        }
    }
}
