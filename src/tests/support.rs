#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::config::EngineConfig;
use crate::driver::{Driver, DriverCatalog, DriverError, DriverFactory, DriverOptions, DriverSink};
use crate::engine::IngestEngine;
use crate::registry::{InstanceRecord, InstanceSource, RegistryError};
use crate::session::LogLevel;
use crate::store::{SparqlBackend, StoreError};

/// Store backend that records updates and can fail selected commands.
pub(crate) struct RecordingBackend {
    pub updates: Mutex<Vec<String>>,
    select_json: Mutex<String>,
    fail_next: AtomicUsize,
    hold: Duration,
    current: AtomicUsize,
    pub max_observed: AtomicUsize,
}

impl RecordingBackend {
    pub(crate) fn new() -> Self {
        Self {
            updates: Mutex::new(Vec::new()),
            select_json: Mutex::new(r#"{"results":{"bindings":[]}}"#.to_string()),
            fail_next: AtomicUsize::new(0),
            hold: Duration::ZERO,
            current: AtomicUsize::new(0),
            max_observed: AtomicUsize::new(0),
        }
    }

    /// Hold each update for the given duration to observe concurrency.
    pub(crate) fn with_hold(hold: Duration) -> Self {
        let mut backend = Self::new();
        backend.hold = hold;
        backend
    }

    /// Fail the next `count` updates with a backend error.
    pub(crate) fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub(crate) fn set_select_json(&self, json: impl Into<String>) {
        *self.select_json.lock() = json.into();
    }

    pub(crate) fn update_count(&self) -> usize {
        self.updates.lock().len()
    }
}

#[async_trait]
impl SparqlBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn update(&self, query: &str, _timeout: Duration) -> Result<(), StoreError> {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_observed.fetch_max(current, Ordering::SeqCst);

        if !self.hold.is_zero() {
            tokio::time::sleep(self.hold).await;
        }

        self.current.fetch_sub(1, Ordering::SeqCst);

        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(StoreError::Backend {
                status: 500,
                message: "injected failure".to_string(),
            });
        }

        self.updates.lock().push(query.to_string());
        Ok(())
    }

    async fn select(&self, _query: &str, _timeout: Duration) -> Result<String, StoreError> {
        Ok(self.select_json.lock().clone())
    }
}

#[derive(Deserialize)]
struct ScriptedOptions {
    statements: Vec<String>,
    #[serde(default)]
    delay_ms: u64,
    #[serde(default)]
    fail: bool,
    #[serde(default)]
    log_message: Option<String>,
}

/// Driver that emits a fixed list of statements after an optional delay.
pub(crate) struct ScriptedDriver {
    statements: Vec<String>,
    delay: Duration,
    fail: bool,
    log_message: Option<String>,
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn fetch(&self, sink: DriverSink) -> Result<(), DriverError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(message) = &self.log_message {
            sink.log(LogLevel::Info, message.clone()).await;
        }

        for statement in &self.statements {
            sink.triple(statement.clone()).await;
        }

        if self.fail {
            return Err(DriverError::Fault("scripted failure".to_string()));
        }

        Ok(())
    }
}

/// Factory for [`ScriptedDriver`]; its options are a YAML statement list.
pub(crate) struct ScriptedFactory;

impl DriverFactory for ScriptedFactory {
    fn kind(&self) -> &str {
        "scripted"
    }

    fn description(&self) -> &str {
        "emits a fixed statement list"
    }

    fn create(&self, options: &DriverOptions) -> Result<Arc<dyn Driver>, DriverError> {
        let options: ScriptedOptions =
            serde_yaml::from_value(options.clone()).map_err(|e| DriverError::InvalidOptions {
                reason: e.to_string(),
            })?;

        Ok(Arc::new(ScriptedDriver {
            statements: options.statements,
            delay: Duration::from_millis(options.delay_ms),
            fail: options.fail,
            log_message: options.log_message,
        }))
    }
}

/// Instance source backed by an in-memory record list.
pub(crate) struct StaticSource {
    records: Mutex<Vec<InstanceRecord>>,
    pub loads: AtomicUsize,
}

impl StaticSource {
    pub(crate) fn new(records: Vec<InstanceRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            loads: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_records(&self, records: Vec<InstanceRecord>) {
        *self.records.lock() = records;
    }
}

#[async_trait]
impl InstanceSource for StaticSource {
    async fn load(&self) -> Result<Vec<InstanceRecord>, RegistryError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.lock().clone())
    }
}

pub(crate) fn record(id: &str, kind: &str, options_yaml: Option<&str>) -> InstanceRecord {
    InstanceRecord {
        id: id.to_string(),
        label: None,
        enabled: true,
        driver_kind: Some(kind.to_string()),
        options_yaml: options_yaml.map(str::to_string),
    }
}

pub(crate) fn statements_yaml(statements: &[&str]) -> String {
    let mut yaml = String::from("statements:\n");
    for statement in statements {
        yaml.push_str(&format!("  - \"{statement}\"\n"));
    }
    yaml
}

pub(crate) fn scripted_catalog() -> DriverCatalog {
    let mut catalog = DriverCatalog::new();
    catalog.register(Arc::new(ScriptedFactory));
    catalog
}

pub(crate) fn engine_with(
    records: Vec<InstanceRecord>,
    backend: Arc<RecordingBackend>,
    concurrency: usize,
    fragment_length: usize,
) -> (IngestEngine, Arc<StaticSource>) {
    let source = Arc::new(StaticSource::new(records));

    let mut config = EngineConfig::default();
    config.concurrency = concurrency;
    config.fragment_length = fragment_length;

    let engine = IngestEngine::with_source(
        config,
        backend,
        scripted_catalog(),
        Arc::clone(&source) as Arc<dyn InstanceSource>,
    );

    (engine, source)
}

/// Poll until the condition holds, panicking after a generous deadline.
pub(crate) async fn wait_until(description: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {description}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
