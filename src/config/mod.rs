mod error;
mod loader;

pub use error::ConfigError;
pub use loader::load;

use serde::{Deserialize, Serialize};

use crate::logger::{LoggerConfig, TelemetryConfig};
use crate::store::StoreConfig;

/// Top-level engine configuration.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct EngineConfig {
    /// Graph holding the declarative driver-instance records.
    pub instances_graph_uri: String,

    /// Maximum number of bulk-insert commands executed concurrently.
    pub concurrency: usize,

    /// Fragment size threshold in bytes.
    pub fragment_length: usize,

    /// Backing store connection settings.
    pub store: StoreConfig,

    /// Logger settings.
    pub logger: LoggerConfig,

    /// Telemetry settings.
    pub telemetry: TelemetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instances_graph_uri: "tag:graph-ingest:driver-instances".to_string(),
            concurrency: 1,
            fragment_length: 1_048_576,
            store: StoreConfig::default(),
            logger: LoggerConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}
