//! Driver capability contract.
//!
//! A driver is a black-box data source. It is constructed by a registered
//! factory from the YAML options of its instance record and emits triple
//! statements and log entries through a [`DriverSink`] during one fetch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::session::LogLevel;

/// Parsed driver options (the YAML blob of an instance record).
pub type DriverOptions = serde_yaml::Value;

/// Driver construction and fetch errors
#[derive(Error, Debug)]
pub enum DriverError {
    /// Options did not match what the driver expects
    #[error("invalid driver options: {reason}")]
    InvalidOptions { reason: String },

    /// The driver failed while constructing or fetching
    #[error("{0}")]
    Fault(String),
}

/// A data source emitting triple statements through a sink.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Emit all data through the sink. Returning is the finished signal;
    /// the owning session then performs its final flush.
    async fn fetch(&self, sink: DriverSink) -> Result<(), DriverError>;
}

/// Creates driver instances of one kind from per-instance options.
pub trait DriverFactory: Send + Sync {
    /// Stable driver kind name referenced by instance records.
    fn kind(&self) -> &str;

    /// Human-readable description for the control layer.
    fn description(&self) -> &str {
        ""
    }

    /// Construct a driver with the given options applied.
    fn create(&self, options: &DriverOptions) -> Result<Arc<dyn Driver>, DriverError>;
}

/// Catalogue of available driver kinds.
///
/// Factories register under their kind name; the registry resolves the kind
/// named by each instance record against this catalogue.
#[derive(Default)]
pub struct DriverCatalog {
    factories: HashMap<String, Arc<dyn DriverFactory>>,
}

impl DriverCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under its kind name. A later registration replaces
    /// an earlier one with the same kind.
    pub fn register(&mut self, factory: Arc<dyn DriverFactory>) {
        self.factories.insert(factory.kind().to_string(), factory);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn DriverFactory>> {
        self.factories.get(kind).cloned()
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

/// Event emitted by a driver during one fetch.
pub(crate) enum DriverEvent {
    Triple(String),
    Log(LogLevel, String),
}

/// Capability handle a driver emits through during one fetch.
///
/// Dropping the sink (by returning from `fetch`) closes the event stream.
pub struct DriverSink {
    tx: mpsc::Sender<DriverEvent>,
}

impl DriverSink {
    pub(crate) fn new(tx: mpsc::Sender<DriverEvent>) -> Self {
        Self { tx }
    }

    /// Emit one complete triple statement, without the terminating marker.
    pub async fn triple(&self, statement: impl Into<String>) {
        if self
            .tx
            .send(DriverEvent::Triple(statement.into()))
            .await
            .is_err()
        {
            tracing::debug!("Session event channel closed; triple dropped");
        }
    }

    /// Emit a log entry into the owning session's log stream.
    pub async fn log(&self, level: LogLevel, message: impl Into<String>) {
        if self
            .tx
            .send(DriverEvent::Log(level, message.into()))
            .await
            .is_err()
        {
            tracing::debug!("Session event channel closed; log entry dropped");
        }
    }
}
