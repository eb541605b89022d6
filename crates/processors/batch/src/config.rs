use color_eyre::eyre;
use duration_string::DurationString;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_SEND_BATCH_SIZE: usize = 8192;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(200);
pub const DEFAULT_METADATA_CARDINALITY_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchProcessorConfig {
    /// Item count at which the in-flight batch is sent regardless of the
    /// timeout. 0 disables size-triggered sending.
    #[serde(default = "default_send_batch_size")]
    pub send_batch_size: usize,

    /// Upper bound on the item count of any batch that is sent. 0 disables
    /// the cap; a nonzero value must be >= send_batch_size. Oversized
    /// arrivals are sent in chunks of at most this many items.
    #[serde(default)]
    pub send_batch_max_size: usize,

    /// Inactivity window after which a non-empty batch is sent. 0s disables
    /// time-triggered sending.
    #[serde(default = "default_timeout")]
    pub timeout: DurationString,

    /// Client metadata keys whose distinct value combinations each get
    /// their own batcher. Compared case-insensitively.
    #[serde(default)]
    pub metadata_keys: Vec<String>,

    /// Maximum number of distinct metadata value combinations before
    /// submissions with unseen combinations are rejected. 0 means
    /// unlimited.
    #[serde(default = "default_metadata_cardinality_limit")]
    pub metadata_cardinality_limit: usize,
}

fn default_send_batch_size() -> usize {
    DEFAULT_SEND_BATCH_SIZE
}

fn default_timeout() -> DurationString {
    DEFAULT_TIMEOUT.into()
}

fn default_metadata_cardinality_limit() -> usize {
    DEFAULT_METADATA_CARDINALITY_LIMIT
}

impl Default for BatchProcessorConfig {
    fn default() -> Self {
        Self {
            send_batch_size: default_send_batch_size(),
            send_batch_max_size: 0,
            timeout: default_timeout(),
            metadata_keys: Vec::new(),
            metadata_cardinality_limit: default_metadata_cardinality_limit(),
        }
    }
}

impl BatchProcessorConfig {
    pub fn timeout(&self) -> Duration {
        self.timeout.clone().into()
    }

    pub fn validate(&self) -> eyre::Result<()> {
        if self.send_batch_max_size != 0 && self.send_batch_max_size < self.send_batch_size {
            eyre::bail!(
                "send_batch_max_size ({}) must be greater than or equal to send_batch_size ({})",
                self.send_batch_max_size,
                self.send_batch_size,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config: BatchProcessorConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, BatchProcessorConfig::default());
        assert_eq!(config.send_batch_size, DEFAULT_SEND_BATCH_SIZE);
        assert_eq!(config.send_batch_max_size, 0);
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        assert!(config.metadata_keys.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_section() {
        let raw = r#"
send_batch_size: 100
send_batch_max_size: 120
timeout: 5s
metadata_keys: [X-Tenant, x-scope-org]
metadata_cardinality_limit: 10
"#;
        let config: BatchProcessorConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.send_batch_size, 100);
        assert_eq!(config.send_batch_max_size, 120);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.metadata_keys, ["X-Tenant", "x-scope-org"]);
        assert_eq!(config.metadata_cardinality_limit, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn max_size_below_size_is_rejected() {
        let config = BatchProcessorConfig {
            send_batch_size: 100,
            send_batch_max_size: 50,
            ..BatchProcessorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_size_is_unbounded() {
        let config = BatchProcessorConfig {
            send_batch_size: 100,
            send_batch_max_size: 0,
            ..BatchProcessorConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
