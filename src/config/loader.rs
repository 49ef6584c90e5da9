use std::path::Path;

use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};

use super::{ConfigError, EngineConfig};

/// Config file consulted when present in the working directory.
const DEFAULT_CONFIG_FILE: &str = "graph-ingest.toml";

/// Load configuration with layered sources (priority: lowest to highest):
/// built-in defaults, `graph-ingest.toml` in the working directory, then an
/// optional explicit file.
pub fn load(custom_config_path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));

    if Path::new(DEFAULT_CONFIG_FILE).exists() {
        figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
    }

    if let Some(config_path) = custom_config_path {
        if !config_path.exists() {
            return Err(ConfigError::MissingConfig(
                config_path.display().to_string(),
            ));
        }
        tracing::info!(path = %config_path.display(), "Loading custom config file");
        figment = figment.merge(Toml::file(config_path));
    }

    figment
        .extract()
        .map_err(|error| ConfigError::Invalid(Box::new(error)))
}
