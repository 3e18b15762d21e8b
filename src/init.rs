use crate::layer::JsonEventLayer;
use crate::layout::JsonEventLayout;
use std::io;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Install a [`JsonEventLayer`] as the global `tracing` subscriber.
///
/// **Parameters**
/// - `layer`: fully configured layer, typically built from one of the
///   [`JsonEventLayout`] presets and a writer.
///
/// **Effects**
///
/// This installs a [`Registry`] combined with the layer as the global
/// default subscriber, so all `tracing` events in the process are encoded
/// as JSON lines.
pub fn init_with_layer<W>(layer: JsonEventLayer<W>)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = Registry::default().with(layer);
    tracing::subscriber::set_global_default(subscriber).expect("set global subscriber");
}

/// Initialize JSON event logging with sensible defaults.
///
/// Equivalent to installing the v1 layout writing to stdout. This is the
/// recommended entrypoint for typical services shipping newline-delimited
/// JSON to a collector.
pub fn init() {
    let layer = JsonEventLayer::new(JsonEventLayout::v1(), io::stdout as fn() -> io::Stdout);
    init_with_layer(layer);
}
