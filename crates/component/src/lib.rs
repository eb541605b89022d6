#![allow(warnings)]

pub mod client;
pub mod config;
pub mod error;
pub mod factory;
pub mod pdata;
pub mod telemetry;

use color_eyre::eyre;

pub use client::{Context, Metadata};
pub use error::ConsumeError;

/// Capabilities a consumer reports to the producers feeding it.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// When set, the consumer may mutate or take apart the payload; a
    /// producer must not reuse a payload after submitting it.
    pub mutates_data: bool,
}

/// Lifecycle shared by every pipeline component.
#[async_trait::async_trait]
pub trait Component: Send + Sync + 'static {
    async fn start(&self) -> eyre::Result<()> {
        Ok(())
    }

    async fn shutdown(&self) -> eyre::Result<()> {
        Ok(())
    }
}

/// A consumer of trace payloads.
#[async_trait::async_trait]
pub trait ConsumeTraces: Send + Sync + 'static {
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    async fn consume_traces(
        &self,
        ctx: &Context,
        traces: pdata::Traces,
    ) -> Result<(), ConsumeError>;
}

/// A consumer of metric payloads.
#[async_trait::async_trait]
pub trait ConsumeMetrics: Send + Sync + 'static {
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    async fn consume_metrics(
        &self,
        ctx: &Context,
        metrics: pdata::Metrics,
    ) -> Result<(), ConsumeError>;
}

/// A consumer of log payloads.
#[async_trait::async_trait]
pub trait ConsumeLogs: Send + Sync + 'static {
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    async fn consume_logs(&self, ctx: &Context, logs: pdata::Logs) -> Result<(), ConsumeError>;
}

pub trait TracesProcessor: Component + ConsumeTraces {}
impl<T: Component + ConsumeTraces> TracesProcessor for T {}

pub trait MetricsProcessor: Component + ConsumeMetrics {}
impl<T: Component + ConsumeMetrics> MetricsProcessor for T {}

pub trait LogsProcessor: Component + ConsumeLogs {}
impl<T: Component + ConsumeLogs> LogsProcessor for T {}
