use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub rate_quotes_total: IntCounterVec,
    pub provider_errors_total: IntCounterVec,
    pub labels_generated_total: IntCounterVec,
    pub label_batch_duration_seconds: HistogramVec,
    pub delivery_claims_total: IntCounterVec,
    pub active_deliveries: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let rate_quotes_total = IntCounterVec::new(
            Opts::new("rate_quotes_total", "Total rate quotes by outcome"),
            &["outcome"],
        )
        .expect("valid rate_quotes_total metric");

        let provider_errors_total = IntCounterVec::new(
            Opts::new(
                "provider_errors_total",
                "Carrier adapter failures by provider",
            ),
            &["provider"],
        )
        .expect("valid provider_errors_total metric");

        let labels_generated_total = IntCounterVec::new(
            Opts::new(
                "labels_generated_total",
                "Label generation attempts by outcome",
            ),
            &["outcome"],
        )
        .expect("valid labels_generated_total metric");

        let label_batch_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "label_batch_duration_seconds",
                "Duration of label batch runs in seconds",
            ),
            &["outcome"],
        )
        .expect("valid label_batch_duration_seconds metric");

        let delivery_claims_total = IntCounterVec::new(
            Opts::new("delivery_claims_total", "Delivery claim attempts by outcome"),
            &["outcome"],
        )
        .expect("valid delivery_claims_total metric");

        let active_deliveries = IntGauge::new(
            "active_deliveries",
            "Deliveries currently claimed and in flight",
        )
        .expect("valid active_deliveries metric");

        registry
            .register(Box::new(rate_quotes_total.clone()))
            .expect("register rate_quotes_total");
        registry
            .register(Box::new(provider_errors_total.clone()))
            .expect("register provider_errors_total");
        registry
            .register(Box::new(labels_generated_total.clone()))
            .expect("register labels_generated_total");
        registry
            .register(Box::new(label_batch_duration_seconds.clone()))
            .expect("register label_batch_duration_seconds");
        registry
            .register(Box::new(delivery_claims_total.clone()))
            .expect("register delivery_claims_total");
        registry
            .register(Box::new(active_deliveries.clone()))
            .expect("register active_deliveries");

        Self {
            registry,
            rate_quotes_total,
            provider_errors_total,
            labels_generated_total,
            label_batch_duration_seconds,
            delivery_claims_total,
            active_deliveries,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
