//! Driver sessions.
//!
//! A session is the runtime binding between one configured data source and
//! its private fragment/submission state. Sessions are created by the
//! registry, re-initialized in place on reload, and never destroyed during
//! the process lifetime.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::driver::{Driver, DriverEvent, DriverSink};
use crate::ingest::writer::FragmentWriter;
use crate::ingest::STATEMENT_TERMINATOR;
use crate::queue::{SubmissionOutcome, SubmissionQueue};

/// Driver event channel capacity; drivers block when the session lags.
const DRIVER_EVENT_QUEUE_SIZE: usize = 1024;

#[derive(Error, Debug)]
pub enum SessionError {
    /// The session has no valid bound driver instance
    #[error("no driver instance bound to session")]
    NoDriver,

    /// A fetch is already running for this session
    #[error("fetch already in progress")]
    FetchInProgress,
}

/// Severity of a session log entry.
///
/// `Finish` semantically marks the session reaching idle; it is mirrored
/// downstream at info severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
    Finish,
}

/// One append-only session log entry.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp_ms: i64,
}

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLifecycle {
    Uninitialized,
    Initializing,
    Active,
    Finished,
    Idle,
    Disabled,
}

struct SessionRuntime {
    lifecycle: SessionLifecycle,
    pending_submissions: usize,
    query_count: u64,
    finished: bool,
    fetch_in_progress: bool,
}

/// The runtime binding between one configured data source and its private
/// fragment/submission state.
pub struct DriverSession {
    id: String,
    graph_uri: Option<String>,
    label: Mutex<Option<String>>,
    driver: Mutex<Option<Arc<dyn Driver>>>,
    logs: Mutex<Vec<LogEntry>>,
    runtime: Mutex<SessionRuntime>,
    queue: SubmissionQueue,
    fragment_length: usize,
}

impl DriverSession {
    pub(crate) fn new(
        id: String,
        graph_uri: Option<String>,
        queue: SubmissionQueue,
        fragment_length: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            graph_uri,
            label: Mutex::new(None),
            driver: Mutex::new(None),
            logs: Mutex::new(Vec::new()),
            runtime: Mutex::new(SessionRuntime {
                lifecycle: SessionLifecycle::Uninitialized,
                pending_submissions: 0,
                query_count: 0,
                finished: false,
                fetch_in_progress: false,
            }),
            queue,
            fragment_length,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Logical graph the session's fragments are scoped to.
    pub fn graph_uri(&self) -> Option<&str> {
        self.graph_uri.as_deref()
    }

    pub fn label(&self) -> Option<String> {
        self.label.lock().clone()
    }

    pub(crate) fn set_label(&self, label: Option<String>) {
        *self.label.lock() = label;
    }

    pub fn lifecycle(&self) -> SessionLifecycle {
        self.runtime.lock().lifecycle
    }

    /// Submissions enqueued but not yet completed.
    pub fn pending_submissions(&self) -> usize {
        self.runtime.lock().pending_submissions
    }

    /// Lifetime count of bulk-insert commands issued by this session.
    pub fn query_count(&self) -> u64 {
        self.runtime.lock().query_count
    }

    /// Append a log entry. Mirrored to tracing; `Finish` entries are
    /// recorded at info severity downstream.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();

        match level {
            LogLevel::Error => tracing::error!(session = %self.id, "{message}"),
            LogLevel::Info | LogLevel::Finish => {
                tracing::info!(session = %self.id, "{message}");
            }
        }

        self.logs.lock().push(LogEntry {
            level,
            message,
            timestamp_ms: Utc::now().timestamp_millis(),
        });
    }

    /// Snapshot of the append-only log sequence.
    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.lock().clone()
    }

    /// Newest log entry, if any.
    pub fn last_log(&self) -> Option<LogEntry> {
        self.logs.lock().last().cloned()
    }

    // ========== Registry-side transitions ==========

    pub(crate) fn mark_initializing(&self) {
        self.runtime.lock().lifecycle = SessionLifecycle::Initializing;
    }

    pub(crate) fn disable(&self) {
        let mut runtime = self.runtime.lock();
        runtime.lifecycle = SessionLifecycle::Disabled;
        runtime.fetch_in_progress = false;
    }

    pub(crate) fn bind_driver(&self, driver: Arc<dyn Driver>) {
        *self.driver.lock() = Some(driver);
        self.runtime.lock().lifecycle = SessionLifecycle::Active;
    }

    // ========== Fetch ==========

    /// Re-enter the active state and ask the bound driver to (re-)emit its
    /// data.
    ///
    /// Errors if no driver instance is bound or a fetch is already running;
    /// a second concurrent fetch would break the per-session statement
    /// ordering guarantee.
    pub fn fetch(self: Arc<Self>) -> Result<(), SessionError> {
        let driver = self.driver.lock().clone().ok_or(SessionError::NoDriver)?;

        {
            let mut runtime = self.runtime.lock();
            if runtime.fetch_in_progress {
                return Err(SessionError::FetchInProgress);
            }
            runtime.fetch_in_progress = true;
            runtime.finished = false;
            runtime.lifecycle = SessionLifecycle::Active;
        }

        tokio::spawn(async move {
            self.run_fetch(driver).await;
        });

        Ok(())
    }

    /// Consume driver events, feeding triples through the fragment writer
    /// until the driver finishes, then perform the final flush.
    async fn run_fetch(self: Arc<Self>, driver: Arc<dyn Driver>) {
        let (tx, mut events) = mpsc::channel(DRIVER_EVENT_QUEUE_SIZE);
        let sink = DriverSink::new(tx);

        let fetch_task = tokio::spawn(async move { driver.fetch(sink).await });

        let mut writer =
            FragmentWriter::new(Arc::clone(&self), self.queue.clone(), self.fragment_length);

        while let Some(event) = events.recv().await {
            match event {
                DriverEvent::Triple(statement) => {
                    writer.append(&statement).await;
                    writer.append(STATEMENT_TERMINATOR).await;
                }
                DriverEvent::Log(level, message) => self.log(level, message),
            }
        }

        match fetch_task.await {
            Ok(Ok(())) => self.log(LogLevel::Info, "Finished fetching."),
            Ok(Err(error)) => self.log(LogLevel::Error, format!("Fetch failed: {error}")),
            Err(error) => self.log(LogLevel::Error, format!("Fetch task failed: {error}")),
        }

        writer.finish().await;
    }

    // ========== Submission accounting ==========

    /// Record one enqueued submission. Called before the command is handed
    /// to the queue so completion can never be observed ahead of the
    /// increment.
    pub(crate) fn begin_submission(&self) {
        let mut runtime = self.runtime.lock();
        runtime.pending_submissions += 1;
        runtime.query_count += 1;
    }

    /// Apply a completion token from the submission queue.
    pub(crate) fn apply_outcome(&self, outcome: &SubmissionOutcome) {
        match &outcome.result {
            Ok(()) => self.log(
                LogLevel::Info,
                format!(
                    "Insert completed in {}ms. (length={})",
                    outcome.duration.as_millis(),
                    outcome.bytes
                ),
            ),
            Err(error) => self.log(LogLevel::Error, format!("Insert failed: {error}")),
        }

        let idle_query_count = {
            let mut runtime = self.runtime.lock();
            runtime.pending_submissions = runtime.pending_submissions.saturating_sub(1);
            Self::try_idle(&mut runtime)
        };

        if let Some(query_count) = idle_query_count {
            self.log_idle(query_count);
        }
    }

    /// Mark the statement stream finished; the session becomes idle once all
    /// pending submissions have completed.
    pub(crate) fn finish_stream(&self) {
        let idle_query_count = {
            let mut runtime = self.runtime.lock();
            runtime.finished = true;
            runtime.fetch_in_progress = false;
            runtime.lifecycle = SessionLifecycle::Finished;
            Self::try_idle(&mut runtime)
        };

        if let Some(query_count) = idle_query_count {
            self.log_idle(query_count);
        }
    }

    /// The idle transition is decided under the runtime lock so it fires
    /// exactly once per fetch cycle.
    fn try_idle(runtime: &mut SessionRuntime) -> Option<u64> {
        if runtime.finished
            && runtime.pending_submissions == 0
            && runtime.lifecycle == SessionLifecycle::Finished
        {
            runtime.lifecycle = SessionLifecycle::Idle;
            Some(runtime.query_count)
        } else {
            None
        }
    }

    fn log_idle(&self, query_count: u64) {
        self.log(LogLevel::Info, format!("{query_count} queries completed."));
        self.log(LogLevel::Finish, "Idle.");
    }
}
