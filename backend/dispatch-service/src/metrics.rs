use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, TextEncoder};

static DISPATCH_OUTCOMES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "push_dispatch_outcomes_total",
            "Per-device send outcomes by platform",
        ),
        &["platform", "outcome"],
    )
    .expect("failed to create push_dispatch_outcomes_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register push_dispatch_outcomes_total");
    counter
});

static DEVICE_MUTATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "push_device_mutations_total",
            "Device registry changes applied after sends",
        ),
        &["action"],
    )
    .expect("failed to create push_device_mutations_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register push_device_mutations_total");
    counter
});

static BATCHES_SCHEDULED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "push_batches_scheduled_total",
        "Device batches handed to the task queue",
    )
    .expect("failed to create push_batches_scheduled_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register push_batches_scheduled_total");
    counter
});

static NOTIFICATIONS_FINALIZED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "push_notifications_finalized_total",
        "Notifications moved to the sent state",
    )
    .expect("failed to create push_notifications_finalized_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register push_notifications_finalized_total");
    counter
});

pub fn observe_dispatch(platform: &str, outcome: &str) {
    DISPATCH_OUTCOMES_TOTAL
        .with_label_values(&[platform, outcome])
        .inc();
}

pub fn observe_device_mutation(action: &str) {
    DEVICE_MUTATIONS_TOTAL.with_label_values(&[action]).inc();
}

pub fn observe_batches_scheduled(count: usize) {
    BATCHES_SCHEDULED_TOTAL.inc_by(count as u64);
}

pub fn observe_finalized() {
    NOTIFICATIONS_FINALIZED_TOTAL.inc();
}

/// Text exposition of every registered metric
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
