use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::Resource;
use serde::Deserialize;

#[derive(
    Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Deserialize, strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
pub enum MetricsLevel {
    /// None indicates that no telemetry data should be collected.
    None,
    /// Basic is the recommended and covers the basics of the service telemetry.
    Basic,
    /// Normal adds some other indicators on top of basic.
    Normal,
    /// Detailed adds dimensions and views to the previous levels.
    Detailed,
}

impl Default for MetricsLevel {
    fn default() -> Self {
        Self::Basic
    }
}

impl MetricsLevel {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// TelemetrySettings provides components with APIs to report telemetry.
#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    /// MeterProvider components use to report their own metrics.
    pub meter_provider: SdkMeterProvider,

    /// The configuration value set when the collector is configured.
    /// Components may use this level to decide whether it is appropriate to
    /// avoid computationally expensive calculations.
    pub metrics_level: MetricsLevel,

    /// Resource contains the resource attributes for the collector's telemetry.
    pub resource: Resource,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            meter_provider: SdkMeterProvider::default(),
            metrics_level: MetricsLevel::default(),
            resource: Resource::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering() {
        assert!(MetricsLevel::Detailed > MetricsLevel::Basic);
        assert!(MetricsLevel::None < MetricsLevel::Basic);
    }

    #[test]
    fn level_from_yaml() {
        let level: MetricsLevel = serde_yaml::from_str("detailed").unwrap();
        assert_eq!(level, MetricsLevel::Detailed);
    }
}
