#![allow(warnings)]

pub mod batch;
pub mod batcher;
pub mod config;
pub mod router;
pub mod telemetry;

use crate::batch::{Batch, LogsBatch, MetricsBatch, TracesBatch};
use crate::batcher::BatcherShared;
use crate::config::BatchProcessorConfig;
use crate::router::{BatcherRouter, BatcherSpawner};
use crate::telemetry::BatchTelemetry;
use color_eyre::eyre;
use otel_stage_component::factory::ComponentName;
use otel_stage_component::pdata::{Logs, Metrics, Traces};
use otel_stage_component::telemetry::TelemetrySettings;
use otel_stage_component::{
    Capabilities, Component, ConsumeError, ConsumeLogs, ConsumeMetrics, ConsumeTraces, Context,
    LogsProcessor, MetricsProcessor, TracesProcessor,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

lazy_static::lazy_static! {
    static ref COMPONENT_NAME: ComponentName = ComponentName::new("batch").unwrap();
}

/// A processor that buffers payloads of one signal kind and sends them
/// downstream in batches.
///
/// A batch is sent out when either of the following holds:
/// - its item count reaches `send_batch_size`
/// - `timeout` has elapsed since the previous send
///
/// With `metadata_keys` configured, every distinct combination of values
/// under those keys gets its own batcher, up to
/// `metadata_cardinality_limit` combinations.
pub struct BatchProcessor<B: Batch> {
    pub id: String,
    pub config: BatchProcessorConfig,
    shutdown_tx: watch::Sender<bool>,
    router: BatcherRouter<B>,
    cardinality: Arc<AtomicUsize>,
}

impl<B: Batch> std::fmt::Debug for BatchProcessor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish()
    }
}

impl<B: Batch> BatchProcessor<B> {
    fn with_batch(
        id: String,
        config: BatchProcessorConfig,
        settings: &TelemetrySettings,
        new_batch: Box<dyn Fn() -> B + Send + Sync>,
    ) -> eyre::Result<Self> {
        config.validate()?;

        // Keys are matched lowercase, to be consistent with http/2 headers.
        let mut metadata_keys: Vec<String> = config
            .metadata_keys
            .iter()
            .map(|key| key.to_ascii_lowercase())
            .collect();
        metadata_keys.sort();
        metadata_keys.dedup();

        let cardinality = Arc::new(AtomicUsize::new(0));
        let gauge_cardinality = cardinality.clone();
        let telemetry = BatchTelemetry::new(settings, move || {
            gauge_cardinality.load(Ordering::Relaxed)
        });

        let shared = Arc::new(BatcherShared {
            timeout: config.timeout(),
            send_batch_size: config.send_batch_size,
            send_batch_max_size: config.send_batch_max_size,
            telemetry,
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let spawner = BatcherSpawner {
            shared,
            new_batch,
            shutdown_rx,
            cardinality: cardinality.clone(),
        };
        let router =
            BatcherRouter::new(spawner, metadata_keys, config.metadata_cardinality_limit);

        Ok(Self {
            id,
            config,
            shutdown_tx,
            router,
            cardinality,
        })
    }

    /// Number of distinct metadata-value combinations with a live batcher.
    pub fn metadata_cardinality(&self) -> usize {
        self.cardinality.load(Ordering::Relaxed)
    }

    async fn consume(&self, ctx: &Context, payload: B::Input) -> Result<(), ConsumeError> {
        let batcher = self.router.route(ctx)?;
        batcher.send(payload).await
    }
}

impl BatchProcessor<TracesBatch> {
    /// Batch processor that batches traces before handing them to `next`.
    pub fn traces(
        id: String,
        config: BatchProcessorConfig,
        settings: &TelemetrySettings,
        next: Arc<dyn ConsumeTraces>,
    ) -> eyre::Result<Self> {
        Self::with_batch(
            id,
            config,
            settings,
            Box::new(move || TracesBatch::new(next.clone())),
        )
    }
}

impl BatchProcessor<MetricsBatch> {
    /// Batch processor that batches metrics before handing them to `next`.
    pub fn metrics(
        id: String,
        config: BatchProcessorConfig,
        settings: &TelemetrySettings,
        next: Arc<dyn ConsumeMetrics>,
    ) -> eyre::Result<Self> {
        Self::with_batch(
            id,
            config,
            settings,
            Box::new(move || MetricsBatch::new(next.clone())),
        )
    }
}

impl BatchProcessor<LogsBatch> {
    /// Batch processor that batches logs before handing them to `next`.
    pub fn logs(
        id: String,
        config: BatchProcessorConfig,
        settings: &TelemetrySettings,
        next: Arc<dyn ConsumeLogs>,
    ) -> eyre::Result<Self> {
        Self::with_batch(
            id,
            config,
            settings,
            Box::new(move || LogsBatch::new(next.clone())),
        )
    }
}

#[async_trait::async_trait]
impl<B: Batch> Component for BatchProcessor<B> {
    async fn start(&self) -> eyre::Result<()> {
        Ok(())
    }

    async fn shutdown(&self) -> eyre::Result<()> {
        // Wake every batcher, then wait for each to drain its channel and
        // flush its remainder.
        let _ = self.shutdown_tx.send(true);
        for batcher in self.router.drain() {
            batcher.join().await;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConsumeTraces for BatchProcessor<TracesBatch> {
    fn capabilities(&self) -> Capabilities {
        Capabilities { mutates_data: true }
    }

    async fn consume_traces(&self, ctx: &Context, traces: Traces) -> Result<(), ConsumeError> {
        self.consume(ctx, traces).await
    }
}

#[async_trait::async_trait]
impl ConsumeMetrics for BatchProcessor<MetricsBatch> {
    fn capabilities(&self) -> Capabilities {
        Capabilities { mutates_data: true }
    }

    async fn consume_metrics(&self, ctx: &Context, metrics: Metrics) -> Result<(), ConsumeError> {
        self.consume(ctx, metrics).await
    }
}

#[async_trait::async_trait]
impl ConsumeLogs for BatchProcessor<LogsBatch> {
    fn capabilities(&self) -> Capabilities {
        Capabilities { mutates_data: true }
    }

    async fn consume_logs(&self, ctx: &Context, logs: Logs) -> Result<(), ConsumeError> {
        self.consume(ctx, logs).await
    }
}

#[derive(Debug, Default)]
pub struct Factory {}

#[async_trait::async_trait]
impl otel_stage_component::factory::ProcessorFactory for Factory {
    fn component_name(&self) -> &ComponentName {
        &COMPONENT_NAME
    }

    async fn create_traces(
        &self,
        id: String,
        settings: TelemetrySettings,
        config: serde_yaml::Value,
        next: Arc<dyn ConsumeTraces>,
    ) -> eyre::Result<Box<dyn TracesProcessor>> {
        let config: BatchProcessorConfig = serde_yaml::from_value(config)?;
        let processor = BatchProcessor::traces(id, config, &settings, next)?;
        Ok(Box::new(processor))
    }

    async fn create_metrics(
        &self,
        id: String,
        settings: TelemetrySettings,
        config: serde_yaml::Value,
        next: Arc<dyn ConsumeMetrics>,
    ) -> eyre::Result<Box<dyn MetricsProcessor>> {
        let config: BatchProcessorConfig = serde_yaml::from_value(config)?;
        let processor = BatchProcessor::metrics(id, config, &settings, next)?;
        Ok(Box::new(processor))
    }

    async fn create_logs(
        &self,
        id: String,
        settings: TelemetrySettings,
        config: serde_yaml::Value,
        next: Arc<dyn ConsumeLogs>,
    ) -> eyre::Result<Box<dyn LogsProcessor>> {
        let config: BatchProcessorConfig = serde_yaml::from_value(config)?;
        let processor = BatchProcessor::logs(id, config, &settings, next)?;
        Ok(Box::new(processor))
    }
}
