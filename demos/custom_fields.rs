use std::collections::BTreeMap;

use json_event_layout::event::{LogEvent, Message};
use json_event_layout::JsonEventLayout;

/// Drives the layout directly, without the tracing layer: custom field
/// names, nested context and user fields.
fn main() {
    let mut layout = JsonEventLayout::v2();
    layout.set_user_fields(Some("service:checkout,region:eu-west-1".to_string()));
    layout.set_flatten_output(false);
    layout
        .field_names_mut()
        .set_context_group("diagnostics")
        .expect("valid group name");

    let mut event = LogEvent::new(
        chrono_now_millis(),
        "ERROR",
        Message::text("payment declined"),
    );
    event.logger_name = Some("checkout::payments".to_string());
    event.thread_name = Some("worker-3".to_string());
    event.mdc = BTreeMap::from([
        ("customer_id".to_string(), serde_json::json!("c-9931")),
        ("attempt".to_string(), serde_json::json!(2)),
    ]);

    match layout.format(&event) {
        Ok(line) => print!("{line}"),
        Err(e) => eprintln!("error encoding event: {e}"),
    }
}

fn chrono_now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
