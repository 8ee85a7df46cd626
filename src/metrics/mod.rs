use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::warn;


lazy_static! {
    pub static ref REGISTRY_NOTIFICATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("registry_notifications", "Observer hook invocations by mutation kind"),
        &["namespace", "kind"]
    )
    .expect("metric can not be created");

    pub static ref LIVE_OBJECTS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("registry_live_objects", "Managed objects currently stored"),
        &["namespace"]
    )
    .expect("metric can not be created");

    pub static ref FILTER_CHANGES: IntCounterVec = IntCounterVec::new(
        Opts::new("property_filter_changes", "Object updates reported by live filters"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref WAIT_OUTCOMES: IntCounterVec = IntCounterVec::new(
        Opts::new("wait_for_updates_outcomes", "How WaitForUpdates calls returned"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref HISTORY_PUSHES: IntCounterVec = IntCounterVec::new(
        Opts::new("history_pushes", "Items appended to history collectors"),
        &["collector_type"]
    )
    .expect("metric can not be created");
}

pub fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(REGISTRY_NOTIFICATIONS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(LIVE_OBJECTS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(FILTER_CHANGES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(WAIT_OUTCOMES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(HISTORY_PUSHES.clone()))
        .expect("collector can be registered");
}

/// Renders `registry` in the Prometheus text exposition format.
pub fn encode_metrics(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        warn!("could not encode custom metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            warn!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
