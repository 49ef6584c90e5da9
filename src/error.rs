use thiserror::Error;

/// Top-level engine error that composes all subsystem errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Backing store errors
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// Instance registry errors
    #[error("Registry error: {0}")]
    Registry(#[from] crate::registry::RegistryError),

    /// Driver session errors
    #[error("Session error: {0}")]
    Session(#[from] crate::session::SessionError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// No session is registered under the given id
    #[error("Unknown session: {0}")]
    UnknownSession(String),
}
