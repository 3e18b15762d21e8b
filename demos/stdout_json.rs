use tracing::{error, info, warn};

use json_event_layout::env::env_or;
use json_event_layout::init::init_with_layer;
use json_event_layout::layer::JsonEventLayer;
use json_event_layout::JsonEventLayout;

fn main() {
    // JSON_EVENT_LAYOUT_SCHEMA=v0|v1|v2 selects the wire format.
    let layout = match env_or("JSON_EVENT_LAYOUT_SCHEMA", "v1").as_str() {
        "v0" => JsonEventLayout::v0(),
        "v2" => JsonEventLayout::v2(),
        _ => JsonEventLayout::v1(),
    };

    init_with_layer(JsonEventLayer::new(layout, std::io::stdout as fn() -> std::io::Stdout));

    info!(request_id = 42, "request accepted");
    warn!(queue_depth = 930, "queue nearly full");

    let failure = std::io::Error::new(std::io::ErrorKind::Other, "connection reset by peer");
    error!(error = &failure as &(dyn std::error::Error + 'static), "upstream call failed");
}
