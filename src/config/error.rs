use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// The requested configuration file does not exist
    #[error("Configuration file not found: {0}")]
    MissingConfig(String),

    /// The configuration could not be parsed or failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}
