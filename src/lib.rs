//! Streaming RDF ingestion pipeline.
//!
//! Pluggable data-source drivers emit an unbounded stream of triple
//! statements. Each configured driver session batches them into size-bounded
//! fragments, serializes a fragment into one SPARQL `INSERT DATA` command,
//! and submits it to the backing store through a single shared,
//! concurrency-limited submission queue. Sessions keep an append-only log
//! stream and transition to an idle state once their source has finished
//! emitting and all pending submissions have completed.

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub(crate) mod ingest;
pub mod logger;
pub(crate) mod metrics;
pub mod queue;
pub mod registry;
pub mod session;
pub mod store;

#[cfg(test)]
mod tests;

pub use config::EngineConfig;
pub use driver::{Driver, DriverCatalog, DriverError, DriverFactory, DriverOptions, DriverSink};
pub use engine::IngestEngine;
pub use error::EngineError;
pub use registry::{
    InstanceRecord, InstanceRegistry, InstanceSource, RegistryError, SparqlInstanceSource,
};
pub use session::{DriverSession, LogEntry, LogLevel, SessionError, SessionLifecycle};
pub use store::{HttpSparqlBackend, SparqlBackend, StoreConfig, StoreError, TimeoutConfig};
