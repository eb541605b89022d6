use crate::telemetry::MetricsLevel;
use color_eyre::eyre;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct Processors {
    #[serde(flatten)]
    pub processors: HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub metrics_level: MetricsLevel,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub processors: Processors,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    pub fn from_file(path: impl AsRef<std::path::Path>) -> eyre::Result<Self> {
        let file = std::fs::OpenOptions::new().read(true).open(path)?;
        let reader = std::io::BufReader::new(file);
        Self::from_reader(reader)
    }

    pub fn from_reader(reader: impl std::io::BufRead) -> eyre::Result<Self> {
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_processor_sections() {
        let raw = r#"
processors:
  batch:
    send_batch_size: 100
  batch/tenant:
    metadata_keys: [tenant]
telemetry:
  metrics_level: detailed
"#;
        let config = Config::from_reader(raw.as_bytes()).unwrap();
        assert_eq!(config.processors.processors.len(), 2);
        assert!(config.processors.processors.contains_key("batch"));
        assert!(config.processors.processors.contains_key("batch/tenant"));
        assert_eq!(config.telemetry.metrics_level, MetricsLevel::Detailed);
    }

    #[test]
    fn empty_config() {
        let config = Config::from_reader("{}".as_bytes()).unwrap();
        assert!(config.processors.processors.is_empty());
        assert_eq!(config.telemetry.metrics_level, MetricsLevel::Basic);
    }
}
