//! Instance registry.
//!
//! Derives driver sessions from an external declarative source and
//! re-initializes them in place on reload. Sessions whose backing record
//! disappears are not torn down; they persist until a later reload brings
//! their record back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

use crate::driver::{DriverCatalog, DriverOptions};
use crate::queue::SubmissionQueue;
use crate::session::{DriverSession, LogLevel};
use crate::store::{SparqlBackend, StoreError};

/// Vocabulary used for instance records in the declarative store.
pub mod vocab {
    pub const DRIVER_INSTANCE: &str = "tag:graph-ingest:DriverInstance";
    pub const DRIVER_KIND: &str = "tag:graph-ingest:driverKind";
    pub const OPTIONS_YAML: &str = "tag:graph-ingest:optionsYaml";
    pub const ENABLED: &str = "tag:graph-ingest:enabled";
    pub const LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
}

#[derive(Error, Debug)]
pub enum RegistryError {
    /// The declarative source could not be read
    #[error("Instance source error: {0}")]
    Source(#[from] StoreError),
}

/// One declarative instance record.
#[derive(Debug, Clone)]
pub struct InstanceRecord {
    pub id: String,
    pub label: Option<String>,
    pub enabled: bool,
    pub driver_kind: Option<String>,
    pub options_yaml: Option<String>,
}

/// External declarative store the registry derives instance records from.
#[async_trait]
pub trait InstanceSource: Send + Sync {
    async fn load(&self) -> Result<Vec<InstanceRecord>, RegistryError>;
}

/// Instance source reading records from the backing SPARQL store.
pub struct SparqlInstanceSource {
    backend: Arc<dyn SparqlBackend>,
    graph_uri: String,
    timeout: Duration,
}

impl SparqlInstanceSource {
    pub fn new(
        backend: Arc<dyn SparqlBackend>,
        graph_uri: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            graph_uri: graph_uri.into(),
            timeout,
        }
    }
}

#[async_trait]
impl InstanceSource for SparqlInstanceSource {
    async fn load(&self) -> Result<Vec<InstanceRecord>, RegistryError> {
        let query = format!(
            "SELECT ?id ?driver ?options ?enabled ?label WHERE {{ GRAPH <{graph}> {{ \
             ?id a <{instance}> . \
             OPTIONAL {{ ?id <{kind}> ?driver }} \
             OPTIONAL {{ ?id <{options}> ?options }} \
             OPTIONAL {{ ?id <{enabled}> ?enabled }} \
             OPTIONAL {{ ?id <{label}> ?label }} \
             }} }}",
            graph = self.graph_uri,
            instance = vocab::DRIVER_INSTANCE,
            kind = vocab::DRIVER_KIND,
            options = vocab::OPTIONS_YAML,
            enabled = vocab::ENABLED,
            label = vocab::LABEL,
        );

        let json = self.backend.select(&query, self.timeout).await?;
        let rows = crate::store::sparql::parse_select_rows(&json)?;

        let mut records = Vec::with_capacity(rows.len());
        for mut row in rows {
            let id = match row.remove("id") {
                Some(id) => id,
                None => continue,
            };

            let enabled = row
                .remove("enabled")
                .map(|value| matches!(value.as_str(), "true" | "1"))
                .unwrap_or(false);

            records.push(InstanceRecord {
                id,
                label: row.remove("label"),
                enabled,
                driver_kind: row.remove("driver"),
                options_yaml: row.remove("options"),
            });
        }

        Ok(records)
    }
}

pub(crate) type SessionMap = Arc<RwLock<HashMap<String, Arc<DriverSession>>>>;

/// Holds all configured driver sessions and the driver-kind catalogue.
pub struct InstanceRegistry {
    sessions: SessionMap,
    catalog: Arc<DriverCatalog>,
    source: Arc<dyn InstanceSource>,
    queue: SubmissionQueue,
    fragment_length: usize,
    initiated: AtomicBool,
    reload_guard: tokio::sync::Mutex<()>,
}

impl InstanceRegistry {
    pub(crate) fn new(
        sessions: SessionMap,
        catalog: Arc<DriverCatalog>,
        source: Arc<dyn InstanceSource>,
        queue: SubmissionQueue,
        fragment_length: usize,
    ) -> Self {
        Self {
            sessions,
            catalog,
            source,
            queue,
            fragment_length,
            initiated: AtomicBool::new(false),
            reload_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Re-derive sessions from the declarative source.
    ///
    /// A no-op once initialized unless forced. A failed reload leaves the
    /// registry uninitialized so the next call retries.
    pub async fn reload(&self, force: bool) -> Result<(), RegistryError> {
        if self.initiated.load(Ordering::SeqCst) && !force {
            return Ok(());
        }

        let _guard = self.reload_guard.lock().await;
        if self.initiated.load(Ordering::SeqCst) && !force {
            return Ok(());
        }

        let records = self.source.load().await?;
        tracing::info!(instances = records.len(), "Reloading driver instances");

        for record in records {
            self.prepare_session(record);
        }

        self.initiated.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Create or re-initialize the session for one instance record.
    ///
    /// Setup failures disable the session and are logged; they never fail
    /// the surrounding reload.
    fn prepare_session(&self, record: InstanceRecord) {
        let session = {
            let mut sessions = self.sessions.write();
            Arc::clone(sessions.entry(record.id.clone()).or_insert_with(|| {
                DriverSession::new(
                    record.id.clone(),
                    Some(record.id.clone()),
                    self.queue.clone(),
                    self.fragment_length,
                )
            }))
        };

        session.set_label(record.label.clone());
        session.mark_initializing();

        let options: DriverOptions = match &record.options_yaml {
            Some(blob) => match serde_yaml::from_str(blob) {
                Ok(options) => options,
                Err(error) => {
                    session.disable();
                    session.log(LogLevel::Error, format!("Invalid options: {error}"));
                    return;
                }
            },
            None => DriverOptions::Null,
        };

        if !record.enabled {
            session.disable();
            session.log(LogLevel::Error, "Disabled.");
            return;
        }

        let kind = match &record.driver_kind {
            Some(kind) => kind,
            None => {
                session.disable();
                session.log(LogLevel::Error, "No driver specified.");
                return;
            }
        };

        let factory = match self.catalog.get(kind) {
            Some(factory) => factory,
            None => {
                session.disable();
                session.log(LogLevel::Error, "Driver does not exist.");
                return;
            }
        };

        session.log(LogLevel::Info, "Initialising...");

        match factory.create(&options) {
            Ok(driver) => {
                session.bind_driver(driver);
                session.log(LogLevel::Finish, "Initialised.");
            }
            Err(error) => {
                session.disable();
                session.log(
                    LogLevel::Error,
                    format!("Driver initialisation failed: {error}"),
                );
            }
        }
    }

    /// Look up one session by id.
    pub fn session(&self, id: &str) -> Option<Arc<DriverSession>> {
        self.sessions.read().get(id).cloned()
    }

    /// All known sessions, ordered by id.
    pub fn sessions(&self) -> Vec<Arc<DriverSession>> {
        let mut sessions: Vec<Arc<DriverSession>> =
            self.sessions.read().values().cloned().collect();
        sessions.sort_by(|a, b| a.id().cmp(b.id()));
        sessions
    }

    /// Available driver kinds, sorted.
    pub fn driver_kinds(&self) -> Vec<String> {
        self.catalog.kinds()
    }
}
