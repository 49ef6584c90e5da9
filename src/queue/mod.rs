//! Shared submission queue.
//!
//! A single process-wide worker executes bulk-insert commands against the
//! backing store with bounded concurrency. Commands start executing in
//! submission order; with a concurrency of 1 completion order matches start
//! order. Completions are reported as [`SubmissionOutcome`] tokens on a
//! separate channel so the queue never holds session references.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::ingest::Fragment;
use crate::store::{SparqlBackend, StoreError};

/// Command channel capacity.
const SUBMISSION_QUEUE_SIZE: usize = 256;

/// Completions channel capacity.
pub(crate) const COMPLETION_QUEUE_SIZE: usize = 256;

#[derive(Error, Debug)]
pub enum QueueError {
    /// The queue is shutting down or its executor is gone
    #[error("submission queue closed")]
    Closed,
}

/// A single bulk-insert operation built from exactly one fragment.
/// Immutable once created.
#[derive(Debug, Clone)]
pub struct SubmissionCommand {
    id: Uuid,
    session_id: String,
    body: String,
    statements: usize,
    bytes: usize,
}

impl SubmissionCommand {
    pub(crate) fn new(session_id: &str, graph_uri: Option<&str>, fragment: Fragment) -> Self {
        let statements = fragment.statements();
        let bytes = fragment.bytes();
        let text = fragment.into_text();

        let body = match graph_uri {
            Some(uri) => format!("INSERT DATA {{ GRAPH <{uri}> {{\n{text}}} }}\n"),
            None => format!("INSERT DATA {{\n{text}}}\n"),
        };

        Self {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            body,
            statements,
            bytes,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Full SPARQL update text of the bulk-insert.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Number of statements in the originating fragment.
    pub fn statements(&self) -> usize {
        self.statements
    }

    /// Byte length of the originating fragment.
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

/// Completion token for one executed command.
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub command_id: Uuid,
    pub session_id: String,
    pub statements: usize,
    pub bytes: usize,
    pub duration: Duration,
    pub result: Result<(), StoreError>,
}

/// Handle for submitting commands. Can be cloned and shared across sessions.
///
/// One queue exists per engine, created at startup and never torn down.
#[derive(Clone)]
pub struct SubmissionQueue {
    tx: mpsc::Sender<SubmissionCommand>,
    pending: Arc<AtomicUsize>,
    shutdown: CancellationToken,
}

impl SubmissionQueue {
    /// Create a new queue channel pair.
    /// Returns the handle (for submitting) and a receiver (for the executor).
    pub(crate) fn channel() -> (Self, mpsc::Receiver<SubmissionCommand>) {
        let (tx, rx) = mpsc::channel(SUBMISSION_QUEUE_SIZE);
        let queue = Self {
            tx,
            pending: Arc::new(AtomicUsize::new(0)),
            shutdown: CancellationToken::new(),
        };
        (queue, rx)
    }

    /// Enqueue a command for execution.
    pub(crate) async fn submit(&self, command: SubmissionCommand) -> Result<(), QueueError> {
        if self.shutdown.is_cancelled() {
            return Err(QueueError::Closed);
        }

        self.pending.fetch_add(1, Ordering::SeqCst);
        crate::metrics::record_queue_depth(self.pending.load(Ordering::SeqCst));

        if self.tx.send(command).await.is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueError::Closed);
        }

        Ok(())
    }

    /// Number of commands accepted but not yet completed.
    pub fn pending_len(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Signal shutdown to stop accepting new commands.
    /// Already queued commands drain to completion.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub(crate) fn pending_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.pending)
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

/// Owns the receiver and runs the submission processing loop.
pub(crate) struct SubmissionExecutor {
    rx: mpsc::Receiver<SubmissionCommand>,
    backend: Arc<dyn SparqlBackend>,
    completions: mpsc::Sender<SubmissionOutcome>,
    pending: Arc<AtomicUsize>,
    concurrency: usize,
    insert_timeout: Duration,
    shutdown: CancellationToken,
}

impl SubmissionExecutor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        rx: mpsc::Receiver<SubmissionCommand>,
        backend: Arc<dyn SparqlBackend>,
        completions: mpsc::Sender<SubmissionOutcome>,
        pending: Arc<AtomicUsize>,
        concurrency: usize,
        insert_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            rx,
            backend,
            completions,
            pending,
            concurrency: concurrency.max(1),
            insert_timeout,
            shutdown,
        }
    }

    /// Runs the executor loop until the channel is closed and in-flight
    /// commands complete.
    ///
    /// At most `concurrency` commands execute at any moment; execution
    /// starts in submission order.
    pub(crate) async fn run(mut self) {
        let mut in_flight: FuturesUnordered<_> = FuturesUnordered::new();
        let mut intake_closed = false;
        let mut shutdown_logged = false;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled(), if !self.rx.is_closed() => {
                    // Stop accepting new commands, but keep draining already buffered ones.
                    self.rx.close();
                    if !shutdown_logged {
                        tracing::info!("Submission queue shutdown signaled; draining queued commands");
                        shutdown_logged = true;
                    }
                }
                outcome = in_flight.select_next_some(), if !in_flight.is_empty() => {
                    self.pending.fetch_sub(1, Ordering::SeqCst);
                    crate::metrics::record_queue_depth(self.pending.load(Ordering::SeqCst));

                    if self.completions.send(outcome).await.is_err() {
                        tracing::warn!("Completion receiver dropped; outcome discarded");
                    }
                }
                command = self.rx.recv(), if !intake_closed && in_flight.len() < self.concurrency => {
                    match command {
                        Some(command) => {
                            in_flight.push(Self::execute(
                                Arc::clone(&self.backend),
                                command,
                                self.insert_timeout,
                            ));
                        }
                        None => {
                            intake_closed = true;
                        }
                    }
                }
                else => {
                    if intake_closed && in_flight.is_empty() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Submission executor stopped");
    }

    /// Execute one command against the backing store.
    async fn execute(
        backend: Arc<dyn SparqlBackend>,
        command: SubmissionCommand,
        timeout: Duration,
    ) -> SubmissionOutcome {
        tracing::debug!(
            session = %command.session_id,
            command = %command.id,
            statements = command.statements,
            bytes = command.bytes,
            "Executing bulk insert"
        );

        let started = Instant::now();
        let result = backend.update(&command.body, timeout).await;
        let duration = started.elapsed();

        crate::metrics::record_submission(
            result.as_ref().err(),
            command.statements,
            command.bytes,
            duration,
        );

        SubmissionOutcome {
            command_id: command.id,
            session_id: command.session_id,
            statements: command.statements,
            bytes: command.bytes,
            duration,
            result,
        }
    }
}
