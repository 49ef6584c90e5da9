//! Composition root.
//!
//! Wires the backing store, driver catalogue, shared submission queue and
//! instance registry together, and spawns the executor and completion
//! dispatcher tasks. One engine exists per process, created at startup.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::driver::DriverCatalog;
use crate::error::EngineError;
use crate::queue::{
    SubmissionExecutor, SubmissionOutcome, SubmissionQueue, COMPLETION_QUEUE_SIZE,
};
use crate::registry::{InstanceRegistry, InstanceSource, SessionMap, SparqlInstanceSource};
use crate::session::{DriverSession, LogLevel};
use crate::store::{HttpSparqlBackend, SparqlBackend, StoreError};

/// Streaming ingestion engine: one shared submission queue, one registry of
/// driver sessions, one backing store.
pub struct IngestEngine {
    config: EngineConfig,
    backend: Arc<dyn SparqlBackend>,
    queue: SubmissionQueue,
    registry: InstanceRegistry,
}

impl IngestEngine {
    /// Connect to the backing store over HTTP and build the engine.
    pub async fn connect(
        config: EngineConfig,
        catalog: DriverCatalog,
    ) -> Result<Self, EngineError> {
        let backend = Arc::new(HttpSparqlBackend::new(config.store.clone())?);
        Self::connect_with_retry(backend.as_ref(), &config).await?;
        Ok(Self::with_backend(config, backend, catalog))
    }

    /// Build the engine over an existing backend. Instance records are read
    /// from the same backend through the bundled SPARQL source.
    pub fn with_backend(
        config: EngineConfig,
        backend: Arc<dyn SparqlBackend>,
        catalog: DriverCatalog,
    ) -> Self {
        let source = Arc::new(SparqlInstanceSource::new(
            Arc::clone(&backend),
            config.instances_graph_uri.clone(),
            config.store.timeouts.query_timeout(),
        ));
        Self::with_source(config, backend, catalog, source)
    }

    /// Build the engine with a custom instance source.
    pub fn with_source(
        config: EngineConfig,
        backend: Arc<dyn SparqlBackend>,
        catalog: DriverCatalog,
        source: Arc<dyn InstanceSource>,
    ) -> Self {
        let (queue, commands) = SubmissionQueue::channel();
        let (completions_tx, completions_rx) = mpsc::channel(COMPLETION_QUEUE_SIZE);

        let executor = SubmissionExecutor::new(
            commands,
            Arc::clone(&backend),
            completions_tx,
            queue.pending_handle(),
            config.concurrency,
            config.store.timeouts.insert_timeout(),
            queue.shutdown_token(),
        );
        tokio::spawn(executor.run());

        let sessions: SessionMap = Arc::new(parking_lot::RwLock::new(HashMap::new()));
        tokio::spawn(dispatch_completions(completions_rx, Arc::clone(&sessions)));

        let registry = InstanceRegistry::new(
            sessions,
            Arc::new(catalog),
            source,
            queue.clone(),
            config.fragment_length,
        );

        Self {
            config,
            backend,
            queue,
            registry,
        }
    }

    /// Connect to the backing store with retry logic.
    async fn connect_with_retry(
        backend: &HttpSparqlBackend,
        config: &EngineConfig,
    ) -> Result<(), StoreError> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match backend.health_check().await {
                Ok(true) => {
                    tracing::info!(
                        backend = %backend.name(),
                        url = %config.store.update_url,
                        "Connected to backing store"
                    );
                    return Ok(());
                }
                Ok(false) => {
                    tracing::warn!(
                        backend = %backend.name(),
                        attempt = attempts,
                        "Store health check returned false"
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        backend = %backend.name(),
                        attempt = attempts,
                        error = %error,
                        "Failed to connect to backing store"
                    );
                }
            }

            if attempts >= config.store.connect_max_retries {
                return Err(StoreError::ConnectionFailed { attempts });
            }

            tokio::time::sleep(config.store.connect_retry_frequency()).await;
        }
    }

    /// The instance registry.
    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    /// Re-derive sessions from the declarative source.
    pub async fn reload(&self, force: bool) -> Result<(), EngineError> {
        self.registry.reload(force).await?;
        Ok(())
    }

    /// Look up one session by id.
    pub fn session(&self, id: &str) -> Option<Arc<DriverSession>> {
        self.registry.session(id)
    }

    /// All known sessions, ordered by id.
    pub fn sessions(&self) -> Vec<Arc<DriverSession>> {
        self.registry.sessions()
    }

    /// Trigger a (re-)fetch for one session.
    pub fn fetch(&self, id: &str) -> Result<(), EngineError> {
        let session = self
            .registry
            .session(id)
            .ok_or_else(|| EngineError::UnknownSession(id.to_string()))?;
        session.fetch()?;
        Ok(())
    }

    /// Drop all data in a session's graph.
    ///
    /// Issued directly against the backing store, outside the submission
    /// queue.
    pub async fn clear_graph(&self, id: &str) -> Result<(), EngineError> {
        let session = self
            .registry
            .session(id)
            .ok_or_else(|| EngineError::UnknownSession(id.to_string()))?;

        let graph_uri = session.graph_uri().unwrap_or_else(|| session.id());
        let update = format!("CLEAR GRAPH <{graph_uri}>");

        self.backend
            .update(&update, self.config.store.timeouts.insert_timeout())
            .await?;

        session.log(LogLevel::Info, "Graph cleared.");
        Ok(())
    }

    /// Commands accepted by the submission queue but not yet completed.
    pub fn queue_pending(&self) -> usize {
        self.queue.pending_len()
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stop accepting new submissions; already queued commands drain in the
    /// background.
    pub fn shutdown(&self) {
        self.queue.shutdown();
    }
}

/// Routes completion tokens from the queue to their owning sessions.
async fn dispatch_completions(
    mut completions: mpsc::Receiver<SubmissionOutcome>,
    sessions: SessionMap,
) {
    while let Some(outcome) = completions.recv().await {
        let session = sessions.read().get(&outcome.session_id).cloned();
        match session {
            Some(session) => session.apply_outcome(&outcome),
            None => {
                tracing::warn!(session = %outcome.session_id, "Completion for unknown session");
            }
        }
    }

    tracing::debug!("Completion dispatcher stopped");
}
