use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::warn;


lazy_static! {
    /// Operations registered with the completion multiplexer and not yet unregistered
    pub static ref PENDING_OPERATIONS: IntGauge = IntGauge::new(
        "fdb_pending_operations",
        "Native futures currently registered with the completion multiplexer"
    )
    .expect("metric can not be created");

    pub static ref PROTOCOL_ANOMALIES: IntCounterVec = IntCounterVec::new(
        Opts::new("fdb_protocol_anomalies", "Bridge-internal protocol anomalies"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref NATIVE_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("fdb_native_errors", "Nonzero native status codes observed"),
        &["code"]
    )
    .expect("metric can not be created");

    pub static ref OPERATION_LATENCY_MS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "fdb_operation_latency_ms",
            "Latency of future-backed operations in ms"
        )
        .buckets(exponential_buckets(0.25, 2.0, 16).expect("buckets can be created")),
        &["op"]
    )
    .expect("metric can not be created");

    /// Process registry with the bridge collectors already registered
    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        if let Err(e) = register_custom_metrics(&registry) {
            warn!("could not register bridge metrics: {}", e);
        }
        registry
    };
}

/// Registers the bridge collectors into `registry`.
pub fn register_custom_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(PENDING_OPERATIONS.clone()))?;
    registry.register(Box::new(PROTOCOL_ANOMALIES.clone()))?;
    registry.register(Box::new(NATIVE_ERRORS.clone()))?;
    registry.register(Box::new(OPERATION_LATENCY_MS.clone()))?;
    Ok(())
}

/// Text exposition of everything gathered from `registry`.
pub fn gather_text(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        warn!("could not encode metrics: {}", e);
        return String::default();
    }
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            warn!("metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
