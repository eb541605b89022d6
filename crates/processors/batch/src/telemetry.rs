use opentelemetry::metrics::{Counter, Histogram, MeterProvider, ObservableGauge};
use otel_stage_component::telemetry::{MetricsLevel, TelemetrySettings};

/// Why a batch was sent.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, strum::Display)]
pub enum SendTrigger {
    #[strum(serialize = "batch_size")]
    BatchSize,
    #[strum(serialize = "timeout")]
    Timeout,
}

/// Self-observability instruments for one batch processor instance.
pub struct BatchTelemetry {
    /// Serialized payload sizes are only computed when the configured
    /// telemetry level asks for them.
    pub detailed: bool,
    batch_send_size: Histogram<u64>,
    batch_send_size_bytes: Option<Histogram<u64>>,
    batch_size_trigger_send: Counter<u64>,
    timeout_trigger_send: Counter<u64>,
    metadata_cardinality: ObservableGauge<u64>,
}

impl BatchTelemetry {
    pub fn new(
        settings: &TelemetrySettings,
        cardinality: impl Fn() -> usize + Send + Sync + 'static,
    ) -> Self {
        let meter = settings.meter_provider.meter("otel-batch-processor");
        let detailed = settings.metrics_level >= MetricsLevel::Detailed;
        let batch_send_size = meter
            .u64_histogram("processor_batch_batch_send_size")
            .with_description("Number of items in the batch that was sent.")
            .init();
        let batch_send_size_bytes = detailed.then(|| {
            meter
                .u64_histogram("processor_batch_batch_send_size_bytes")
                .with_description("Number of bytes in the batch that was sent.")
                .init()
        });
        let batch_size_trigger_send = meter
            .u64_counter("processor_batch_batch_size_trigger_send")
            .with_description("Number of times the batch was sent due to a size trigger.")
            .init();
        let timeout_trigger_send = meter
            .u64_counter("processor_batch_timeout_trigger_send")
            .with_description("Number of times the batch was sent due to a timeout trigger.")
            .init();
        let metadata_cardinality = meter
            .u64_observable_gauge("processor_batch_metadata_cardinality")
            .with_description("Number of distinct metadata value combinations being processed.")
            .with_callback(move |observer| observer.observe(cardinality() as u64, &[]))
            .init();
        Self {
            detailed,
            batch_send_size,
            batch_send_size_bytes,
            batch_size_trigger_send,
            timeout_trigger_send,
            metadata_cardinality,
        }
    }

    /// Records one successful send.
    pub fn record(&self, trigger: SendTrigger, items: u64, bytes: u64) {
        match trigger {
            SendTrigger::BatchSize => self.batch_size_trigger_send.add(1, &[]),
            SendTrigger::Timeout => self.timeout_trigger_send.add(1, &[]),
        }
        self.batch_send_size.record(items, &[]);
        if let Some(histogram) = &self.batch_send_size_bytes {
            histogram.record(bytes, &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detailed_follows_the_metrics_level() {
        let mut settings = TelemetrySettings::default();
        assert!(!BatchTelemetry::new(&settings, || 1).detailed);

        settings.metrics_level = MetricsLevel::Detailed;
        assert!(BatchTelemetry::new(&settings, || 1).detailed);
    }

    #[test]
    fn trigger_names() {
        assert_eq!(SendTrigger::BatchSize.to_string(), "batch_size");
        assert_eq!(SendTrigger::Timeout.to_string(), "timeout");
    }
}
