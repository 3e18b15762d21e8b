use crate::date::{format_timestamp, TimestampFormat};
use crate::event::{LogEvent, Message};
use crate::fieldnames::{ConfigError, FieldNames};
use crate::{env, host, userfields};
use serde_json::{Map, Value};

/// Error type returned by [`JsonEventLayout::format`].
///
/// Enrichment failures never surface here; they degrade to omitted fields.
/// The only fatal condition is a document that cannot be serialized at all.
#[derive(thiserror::Error, Debug)]
pub enum LayoutError {
    #[error("failed to serialize event document")]
    Serialization(#[from] serde_json::Error),
}

/// How context-map values that are not plain strings are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextFidelity {
    /// Every value is stringified.
    Shallow,
    /// Nested maps are preserved as nested JSON objects.
    Deep,
}

/// Encodes [`LogEvent`]s into single-line JSON documents.
///
/// One instance is long-lived and holds only configuration; each
/// [`format`](JsonEventLayout::format) call builds its document from
/// scratch, so concurrent calls on a shared instance are independent.
/// The historical wire formats are presets over one pipeline: the
/// [`FieldNames`] registry picks the output keys and nesting, an optional
/// version marker and an optional envelope key pick the document shape.
#[derive(Debug, Clone)]
pub struct JsonEventLayout {
    field_names: FieldNames,
    version_marker: Option<u32>,
    fields_envelope: Option<String>,
    timestamp_format: TimestampFormat,
    location_info: bool,
    render_structured: bool,
    context_fidelity: ContextFidelity,
    always_emit_ndc: bool,
    user_fields: Option<String>,
    hostname: String,
}

impl Default for JsonEventLayout {
    fn default() -> Self {
        Self::v1()
    }
}

impl JsonEventLayout {
    /// The oldest wire format: `@source_host`/`@message`/`@timestamp` at the
    /// root, everything else nested under an `@fields` envelope, no version
    /// marker.
    pub fn v0() -> Self {
        JsonEventLayout {
            field_names: FieldNames::logstash_v0(),
            version_marker: None,
            fields_envelope: Some("@fields".to_string()),
            ..Self::v1()
        }
    }

    /// The flat v1 wire format: `@version: 1`, snake-case keys at the root,
    /// exception and context nested under fixed keys.
    pub fn v1() -> Self {
        JsonEventLayout {
            field_names: FieldNames::logstash_v1(),
            version_marker: Some(1),
            fields_envelope: None,
            timestamp_format: TimestampFormat::UtcZulu,
            location_info: true,
            render_structured: false,
            context_fidelity: ContextFidelity::Deep,
            always_emit_ndc: false,
            user_fields: None,
            hostname: host::resolve().to_string(),
        }
    }

    /// The registry-driven wire format: every output key comes from the
    /// [`FieldNames`] table and the output starts out flattened.
    pub fn v2() -> Self {
        JsonEventLayout {
            field_names: FieldNames::default(),
            ..Self::v1()
        }
    }

    pub fn location_info(&self) -> bool {
        self.location_info
    }

    /// Whether to include call-site fields in the output.
    pub fn set_location_info(&mut self, location_info: bool) {
        self.location_info = location_info;
    }

    pub fn user_fields(&self) -> Option<&str> {
        self.user_fields.as_deref()
    }

    /// Static user fields in `key:value,key:value` form, merged into every
    /// document. The [`env::USER_FIELDS_ENV`] environment variable supplies
    /// a second, higher-precedence source.
    pub fn set_user_fields(&mut self, spec: Option<String>) {
        self.user_fields = spec;
    }

    /// Expand structured message payloads field-by-field instead of
    /// emitting a single message string. Off by default.
    pub fn set_render_structured(&mut self, render_structured: bool) {
        self.render_structured = render_structured;
    }

    pub fn set_context_fidelity(&mut self, fidelity: ContextFidelity) {
        self.context_fidelity = fidelity;
    }

    /// Emit the context-stack key even when the event carries none,
    /// as an empty string. Off by default.
    pub fn set_always_emit_ndc(&mut self, always: bool) {
        self.always_emit_ndc = always;
    }

    pub fn set_timestamp_format(&mut self, format: TimestampFormat) {
        self.timestamp_format = format;
    }

    /// Merge the grouped sections into the root document instead of nesting
    /// them. Delegates to [`FieldNames::set_flatten_output`].
    pub fn set_flatten_output(&mut self, flatten: bool) {
        self.field_names.set_flatten_output(flatten);
    }

    pub fn field_names(&self) -> &FieldNames {
        &self.field_names
    }

    pub fn field_names_mut(&mut self) -> &mut FieldNames {
        &mut self.field_names
    }

    /// Swap the whole naming scheme.
    pub fn set_field_names(&mut self, field_names: FieldNames) {
        self.field_names = field_names;
    }

    /// Load a naming scheme by identifier (see [`FieldNames::for_scheme`]).
    ///
    /// An unknown identifier is reported and leaves the previous registry in
    /// effect; formatting is never interrupted by a bad scheme name.
    pub fn set_field_names_by_scheme(&mut self, id: &str) -> Result<(), ConfigError> {
        match FieldNames::for_scheme(id) {
            Ok(names) => {
                self.field_names = names;
                Ok(())
            }
            Err(err) => {
                tracing::error!(scheme = id, %err, "invalid field-name scheme, keeping previous field names");
                Err(err)
            }
        }
    }

    /// Encode one event as a single-line JSON document terminated by `\n`.
    pub fn format(&self, event: &LogEvent) -> Result<String, LayoutError> {
        let names = &self.field_names;
        let mut doc = Map::new();
        // Everything below the root basics goes here; depending on the
        // schema it either lands under the envelope key or merges into the
        // root, in emission order.
        let mut fields = Map::new();

        if let Some(version) = self.version_marker {
            doc.insert(names.version.clone(), Value::from(version));
        }
        doc.insert(
            names.timestamp.clone(),
            Value::String(format_timestamp(event.timestamp_millis, self.timestamp_format)),
        );

        let override_fields = std::env::var(env::USER_FIELDS_ENV).ok();
        userfields::apply(&mut doc, self.user_fields.as_deref(), override_fields.as_deref());

        doc.insert(names.host_name.clone(), Value::String(self.hostname.clone()));

        self.add_message(event, &mut doc, &mut fields);

        if let Some(error) = &event.error {
            let mut section = Map::new();
            add_if_present(&mut section, &names.exception_class, error.class_name.clone().map(Value::String));
            add_if_present(&mut section, &names.exception_message, error.message.clone().map(Value::String));
            if !error.stack_frames.is_empty() {
                section.insert(names.stack_trace.clone(), Value::String(error.stack_frames.join("\n")));
            }
            match names.exception_group() {
                Some(group) => {
                    fields.insert(group.to_string(), Value::Object(section));
                }
                None => merge(&mut fields, section),
            }
        }

        if self.location_info {
            if let Some(site) = &event.call_site {
                let mut section = Map::new();
                add_if_present(&mut section, &names.caller_file, site.file.clone().map(Value::String));
                add_if_present(&mut section, &names.caller_line, site.line.map(Value::from));
                add_if_present(&mut section, &names.caller_class, site.class.clone().map(Value::String));
                add_if_present(&mut section, &names.caller_method, site.method.clone().map(Value::String));
                match names.caller_group() {
                    Some(group) => {
                        fields.insert(group.to_string(), Value::Object(section));
                    }
                    None => merge(&mut fields, section),
                }
            }
        }

        add_if_present(&mut fields, &names.logger, event.logger_name.clone().map(Value::String));

        if !event.mdc.is_empty() {
            let mut section = Map::new();
            for (key, value) in &event.mdc {
                section.insert(key.clone(), self.context_value(value));
            }
            match names.context_group() {
                Some(group) => {
                    fields.insert(group.to_string(), Value::Object(section));
                }
                None => merge(&mut fields, section),
            }
        }

        match &event.ndc {
            Some(ndc) => {
                fields.insert(names.ndc.clone(), Value::String(ndc.clone()));
            }
            None if self.always_emit_ndc => {
                fields.insert(names.ndc.clone(), Value::String(String::new()));
            }
            None => {}
        }
        fields.insert(names.level.clone(), Value::String(event.level.clone()));
        add_if_present(&mut fields, &names.thread, event.thread_name.clone().map(Value::String));

        match &self.fields_envelope {
            Some(envelope) => {
                doc.insert(envelope.clone(), Value::Object(fields));
            }
            None => merge(&mut doc, fields),
        }

        let mut line = serde_json::to_string(&Value::Object(doc))?;
        line.push('\n');
        Ok(line)
    }

    fn add_message(&self, event: &LogEvent, doc: &mut Map<String, Value>, fields: &mut Map<String, Value>) {
        if self.render_structured {
            if let Message::Structured(payload) = &event.message {
                match payload.entries() {
                    Ok(entries) => {
                        for (key, value) in entries {
                            fields.insert(key, value);
                        }
                        return;
                    }
                    Err(err) => {
                        tracing::debug!(%err, "falling back to rendered message text");
                    }
                }
            }
        }
        doc.insert(self.field_names.message.clone(), Value::String(event.message.rendered()));
    }

    fn context_value(&self, value: &Value) -> Value {
        match self.context_fidelity {
            ContextFidelity::Deep => value.clone(),
            ContextFidelity::Shallow => match value {
                Value::String(text) => Value::String(text.clone()),
                other => Value::String(other.to_string()),
            },
        }
    }
}

fn add_if_present(map: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value);
    }
}

fn merge(target: &mut Map<String, Value>, section: Map<String, Value>) {
    for (key, value) in section {
        target.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CallSite, ObjectMessage, StructuredMessage, StructuredMessageError, ThrownError};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    // Guards tests that touch the process-wide user-field variable.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn sample_event() -> LogEvent {
        let mut event = LogEvent::new(1364844991207, "INFO", Message::text("this is an info message"));
        event.logger_name = Some("app::module".to_string());
        event.thread_name = Some("main".to_string());
        event
    }

    fn parse(line: &str) -> Value {
        assert!(line.ends_with('\n'), "line is not newline-terminated: {line:?}");
        assert_eq!(line.matches('\n').count(), 1, "more than one newline: {line:?}");
        serde_json::from_str(line.trim_end()).expect("output is not valid JSON")
    }

    #[test]
    fn output_is_one_json_line() {
        let layout = JsonEventLayout::v1();
        let doc = parse(&layout.format(&sample_event()).unwrap());
        assert!(doc.is_object());
    }

    #[test]
    fn v1_has_required_keys() {
        let layout = JsonEventLayout::v1();
        let doc = parse(&layout.format(&sample_event()).unwrap());
        for key in ["message", "source_host", "@timestamp", "@version"] {
            assert!(doc.get(key).is_some(), "missing {key}");
        }
        assert_eq!(doc["@version"], json!(1));
        assert_eq!(doc["@timestamp"], json!("2013-04-01T19:36:31.207Z"));
        assert_eq!(doc["level"], json!("INFO"));
        assert_eq!(doc["logger_name"], json!("app::module"));
        assert_eq!(doc["thread_name"], json!("main"));
    }

    #[test]
    fn v2_common_keys_follow_registry() {
        let layout = JsonEventLayout::v2();
        let doc = parse(&layout.format(&sample_event()).unwrap());
        for key in layout.field_names().list_common_names() {
            assert!(doc.get(key).is_some(), "missing {key}");
        }
        assert_eq!(doc["@version"], json!(1));
        assert_eq!(doc["loggername"], json!("app::module"));
        assert_eq!(doc["threadname"], json!("main"));
    }

    #[test]
    fn v0_nests_fields_under_envelope() {
        let layout = JsonEventLayout::v0();
        let doc = parse(&layout.format(&sample_event()).unwrap());
        assert_eq!(doc["@message"], json!("this is an info message"));
        assert!(doc.get("@source_host").is_some());
        assert!(doc.get("@version").is_none());
        let fields = doc["@fields"].as_object().expect("@fields envelope missing");
        assert_eq!(fields["level"], json!("INFO"));
        assert_eq!(fields["threadName"], json!("main"));
        assert_eq!(fields["loggerName"], json!("app::module"));
    }

    #[test]
    fn host_name_matches_resolver() {
        let layout = JsonEventLayout::v1();
        let doc = parse(&layout.format(&sample_event()).unwrap());
        assert_eq!(doc["source_host"], json!(crate::host::resolve()));
    }

    #[test]
    fn user_fields_from_config() {
        let _guard = ENV_LOCK.lock().unwrap();
        let mut layout = JsonEventLayout::v1();
        layout.set_user_fields(Some("field1:value1".to_string()));
        let doc = parse(&layout.format(&sample_event()).unwrap());
        assert_eq!(doc["field1"], json!("value1"));
    }

    #[test]
    fn user_fields_multi() {
        let _guard = ENV_LOCK.lock().unwrap();
        let mut layout = JsonEventLayout::v1();
        layout.set_user_fields(Some("field2:value2,field3:value3".to_string()));
        let doc = parse(&layout.format(&sample_event()).unwrap());
        assert_eq!(doc["field2"], json!("value2"));
        assert_eq!(doc["field3"], json!("value3"));
    }

    #[test]
    fn user_fields_env_override_wins() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var(crate::env::USER_FIELDS_ENV, "field1:propval1");
        let mut layout = JsonEventLayout::v1();
        layout.set_user_fields(Some("field1:value1".to_string()));
        let doc = parse(&layout.format(&sample_event()).unwrap());
        std::env::remove_var(crate::env::USER_FIELDS_ENV);
        assert_eq!(doc["field1"], json!("propval1"));
    }

    #[test]
    fn exception_section_nested_in_v1() {
        let mut event = sample_event();
        event.error = Some(ThrownError {
            class_name: Some("std::io::Error".to_string()),
            message: Some("shits on fire, yo".to_string()),
            stack_frames: vec!["frame one".to_string(), "frame two".to_string()],
        });
        let layout = JsonEventLayout::v1();
        let doc = parse(&layout.format(&event).unwrap());
        let exception = doc["exception"].as_object().expect("exception not nested");
        assert_eq!(exception["exception_class"], json!("std::io::Error"));
        assert_eq!(exception["exception_message"], json!("shits on fire, yo"));
        assert_eq!(exception["stacktrace"], json!("frame one\nframe two"));
    }

    #[test]
    fn exception_subfields_omitted_when_missing() {
        let mut event = sample_event();
        event.error = Some(ThrownError {
            class_name: Some("std::io::Error".to_string()),
            message: None,
            stack_frames: Vec::new(),
        });
        let layout = JsonEventLayout::v1();
        let doc = parse(&layout.format(&event).unwrap());
        let exception = doc["exception"].as_object().unwrap();
        assert!(exception.get("exception_message").is_none());
        assert!(exception.get("stacktrace").is_none());
    }

    #[test]
    fn no_error_means_no_exception_keys() {
        let layout = JsonEventLayout::v1();
        let doc = parse(&layout.format(&sample_event()).unwrap());
        assert!(doc.get("exception").is_none());
        assert!(doc.get("exception_class").is_none());
        assert!(doc.get("exception_message").is_none());
        assert!(doc.get("stacktrace").is_none());
    }

    #[test]
    fn exception_flattened_in_v2() {
        let mut event = sample_event();
        event.error = Some(ThrownError {
            class_name: Some("std::io::Error".to_string()),
            message: Some("boom".to_string()),
            stack_frames: Vec::new(),
        });
        let layout = JsonEventLayout::v2();
        let doc = parse(&layout.format(&event).unwrap());
        assert_eq!(doc["exceptionclass"], json!("std::io::Error"));
        assert_eq!(doc["exceptionmessage"], json!("boom"));
        assert!(doc.get("exception").is_none());
    }

    fn with_call_site(mut event: LogEvent) -> LogEvent {
        event.call_site = Some(CallSite {
            file: Some("layout.rs".to_string()),
            line: Some(42),
            class: Some("json_event_layout::layout".to_string()),
            method: Some("format".to_string()),
        });
        event
    }

    #[test]
    fn caller_keys_flat_in_v1_with_numeric_line() {
        let layout = JsonEventLayout::v1();
        let doc = parse(&layout.format(&with_call_site(sample_event())).unwrap());
        assert_eq!(doc["file"], json!("layout.rs"));
        assert_eq!(doc["line_number"], json!(42));
        assert!(doc["line_number"].is_u64());
        assert_eq!(doc["class"], json!("json_event_layout::layout"));
        assert_eq!(doc["method"], json!("format"));
    }

    #[test]
    fn disabled_location_info_removes_caller_keys() {
        let mut layout = JsonEventLayout::v1();
        layout.set_location_info(false);
        let doc = parse(&layout.format(&with_call_site(sample_event())).unwrap());
        for key in ["file", "line_number", "class", "method", "caller"] {
            assert!(doc.get(key).is_none(), "unexpected {key}");
        }
    }

    #[test]
    fn unresolvable_call_site_is_skipped_entirely() {
        let layout = JsonEventLayout::v1();
        let doc = parse(&layout.format(&sample_event()).unwrap());
        for key in ["file", "line_number", "class", "method"] {
            assert!(doc.get(key).is_none(), "unexpected {key}");
        }
    }

    #[test]
    fn caller_nests_under_group_when_configured() {
        let mut layout = JsonEventLayout::v2();
        layout.set_flatten_output(false);
        let doc = parse(&layout.format(&with_call_site(sample_event())).unwrap());
        let caller = doc["caller"].as_object().expect("caller not nested");
        assert_eq!(caller["filename"], json!("layout.rs"));
        assert_eq!(caller["linenumber"], json!(42));
    }

    #[test]
    fn mdc_nested_in_v1_and_flattened_in_v2() {
        let mut event = sample_event();
        event.mdc = BTreeMap::from([("foo".to_string(), json!("bar"))]);

        let doc = parse(&JsonEventLayout::v1().format(&event).unwrap());
        assert_eq!(doc["mdc"]["foo"], json!("bar"));

        let doc = parse(&JsonEventLayout::v2().format(&event).unwrap());
        assert_eq!(doc["foo"], json!("bar"));
        assert!(doc.get("mdc").is_none());
    }

    #[test]
    fn flatten_toggle_moves_context_to_root() {
        let mut event = sample_event();
        event.mdc = BTreeMap::from([("foo".to_string(), json!("bar"))]);
        let mut layout = JsonEventLayout::v1();
        layout.set_flatten_output(true);
        let doc = parse(&layout.format(&event).unwrap());
        assert_eq!(doc["foo"], json!("bar"));
        assert!(doc.get("mdc").is_none());
    }

    #[test]
    fn nested_context_values_survive_deep_fidelity() {
        let mut event = sample_event();
        event.mdc = BTreeMap::from([("foo".to_string(), json!({"bar": "baz"}))]);
        let doc = parse(&JsonEventLayout::v1().format(&event).unwrap());
        assert_eq!(doc["mdc"]["foo"]["bar"], json!("baz"));
    }

    #[test]
    fn shallow_fidelity_stringifies_nested_values() {
        let mut event = sample_event();
        event.mdc = BTreeMap::from([
            ("foo".to_string(), json!({"bar": "baz"})),
            ("plain".to_string(), json!("kept")),
        ]);
        let mut layout = JsonEventLayout::v1();
        layout.set_context_fidelity(ContextFidelity::Shallow);
        let doc = parse(&layout.format(&event).unwrap());
        assert_eq!(doc["mdc"]["foo"], json!("{\"bar\":\"baz\"}"));
        assert_eq!(doc["mdc"]["plain"], json!("kept"));
    }

    #[test]
    fn empty_context_map_contributes_nothing() {
        let doc = parse(&JsonEventLayout::v1().format(&sample_event()).unwrap());
        assert!(doc.get("mdc").is_none());
    }

    #[test]
    fn ndc_present_when_supplied_and_absent_otherwise() {
        let mut event = sample_event();
        event.ndc = Some("json-layout-test".to_string());
        let layout = JsonEventLayout::v1();
        let doc = parse(&layout.format(&event).unwrap());
        assert_eq!(doc["ndc"], json!("json-layout-test"));

        let doc = parse(&layout.format(&sample_event()).unwrap());
        assert!(doc.get("ndc").is_none());
    }

    #[test]
    fn always_emit_ndc_writes_empty_string() {
        let mut layout = JsonEventLayout::v1();
        layout.set_always_emit_ndc(true);
        let doc = parse(&layout.format(&sample_event()).unwrap());
        assert_eq!(doc["ndc"], json!(""));
    }

    #[test]
    fn structured_message_expands_when_enabled() {
        let mut map = serde_json::Map::new();
        map.insert("order_id".to_string(), json!(991));
        map.insert("state".to_string(), json!("filled"));
        let mut event = sample_event();
        event.message = Message::Structured(Arc::new(ObjectMessage(map)));

        let mut layout = JsonEventLayout::v1();
        layout.set_render_structured(true);
        let doc = parse(&layout.format(&event).unwrap());
        assert_eq!(doc["order_id"], json!(991));
        assert_eq!(doc["state"], json!("filled"));
        assert!(doc.get("message").is_none());
    }

    #[test]
    fn structured_message_renders_as_text_when_disabled() {
        let mut map = serde_json::Map::new();
        map.insert("order_id".to_string(), json!(991));
        let mut event = sample_event();
        event.message = Message::Structured(Arc::new(ObjectMessage(map)));

        let doc = parse(&JsonEventLayout::v1().format(&event).unwrap());
        assert_eq!(doc["message"], json!("{\"order_id\":991}"));
    }

    struct FailingMessage;

    impl std::fmt::Display for FailingMessage {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "rendered fallback")
        }
    }

    impl StructuredMessage for FailingMessage {
        fn entries(&self) -> Result<Vec<(String, Value)>, StructuredMessageError> {
            Err(StructuredMessageError("no fields".to_string()))
        }
    }

    #[test]
    fn failed_expansion_falls_back_to_message_text() {
        let mut event = sample_event();
        event.message = Message::Structured(Arc::new(FailingMessage));
        let mut layout = JsonEventLayout::v1();
        layout.set_render_structured(true);
        let doc = parse(&layout.format(&event).unwrap());
        assert_eq!(doc["message"], json!("rendered fallback"));
    }

    #[test]
    fn scheme_swap_by_identifier() {
        let mut layout = JsonEventLayout::v1();
        layout.set_field_names_by_scheme("v0").unwrap();
        assert_eq!(layout.field_names().message, "@message");
    }

    #[test]
    fn unknown_scheme_keeps_previous_registry() {
        let mut layout = JsonEventLayout::v1();
        assert!(layout.set_field_names_by_scheme("no-such-scheme").is_err());
        assert_eq!(layout.field_names().message, "message");
        // Formatting still works with the previous registry.
        let doc = parse(&layout.format(&sample_event()).unwrap());
        assert_eq!(doc["message"], json!("this is an info message"));
    }

    #[test]
    fn context_key_collision_follows_emission_order() {
        // In flatten mode a context key may shadow an earlier reserved key;
        // keys emitted after the context (level, thread) keep their values.
        let mut event = sample_event();
        event.mdc = BTreeMap::from([
            ("message".to_string(), json!("from-mdc")),
            ("level".to_string(), json!("from-mdc")),
        ]);
        let mut layout = JsonEventLayout::v1();
        layout.set_flatten_output(true);
        let doc = parse(&layout.format(&event).unwrap());
        assert_eq!(doc["message"], json!("from-mdc"));
        assert_eq!(doc["level"], json!("INFO"));
    }

    #[test]
    fn concurrent_formatting_keeps_documents_independent() {
        let layout = Arc::new(JsonEventLayout::v1());
        let mut handles = Vec::new();
        for thread_id in 0..8 {
            let layout = Arc::clone(&layout);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    let marker = format!("message-{thread_id}-{i}");
                    let mut event = LogEvent::new(1364844991207 + i, "WARN", Message::text(marker.clone()));
                    event.thread_name = Some(format!("worker-{thread_id}"));
                    let line = layout.format(&event).unwrap();
                    let doc: Value = serde_json::from_str(line.trim_end()).unwrap();
                    assert_eq!(doc["message"], json!(marker));
                    assert_eq!(doc["thread_name"], json!(format!("worker-{thread_id}")));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
