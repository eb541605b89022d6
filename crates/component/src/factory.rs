use crate::telemetry::TelemetrySettings;
use crate::{ConsumeLogs, ConsumeMetrics, ConsumeTraces};
use crate::{LogsProcessor, MetricsProcessor, TracesProcessor};
use color_eyre::eyre;
use regex::Regex;
use std::sync::Arc;

#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ComponentName(String);

lazy_static::lazy_static! {
    static ref COMPONENT_NAME_REGEX: Regex = Regex::new(r"^[a-zA-Z][0-9a-zA-Z_]{0,62}$").unwrap();
}

impl ComponentName {
    pub fn new(name: impl Into<String>) -> eyre::Result<Self> {
        let name: String = name.into();
        if !COMPONENT_NAME_REGEX.is_match(&name) {
            eyre::bail!("invalid name: {name:?}");
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ComponentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl From<&ComponentName> for String {
    fn from(name: &ComponentName) -> Self {
        name.0.clone()
    }
}

/// Builds processor instances, one per signal kind, wired to the consumer
/// they feed.
#[async_trait::async_trait]
pub trait ProcessorFactory: Send + Sync {
    fn component_name(&self) -> &ComponentName;

    async fn create_traces(
        &self,
        id: String,
        settings: TelemetrySettings,
        config: serde_yaml::Value,
        next: Arc<dyn ConsumeTraces>,
    ) -> eyre::Result<Box<dyn TracesProcessor>>;

    async fn create_metrics(
        &self,
        id: String,
        settings: TelemetrySettings,
        config: serde_yaml::Value,
        next: Arc<dyn ConsumeMetrics>,
    ) -> eyre::Result<Box<dyn MetricsProcessor>>;

    async fn create_logs(
        &self,
        id: String,
        settings: TelemetrySettings,
        config: serde_yaml::Value,
        next: Arc<dyn ConsumeLogs>,
    ) -> eyre::Result<Box<dyn LogsProcessor>>;
}
