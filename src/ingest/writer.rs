use std::sync::Arc;
use std::time::Duration;

use super::StatementBuffer;
use crate::queue::{SubmissionCommand, SubmissionOutcome, SubmissionQueue};
use crate::session::DriverSession;
use crate::store::StoreError;

/// Flushes buffered statements into discrete fragments and submits each as
/// one bulk-insert command on the shared queue.
pub(crate) struct FragmentWriter {
    buffer: StatementBuffer,
    threshold: usize,
    session: Arc<DriverSession>,
    queue: SubmissionQueue,
}

impl FragmentWriter {
    pub(crate) fn new(session: Arc<DriverSession>, queue: SubmissionQueue, threshold: usize) -> Self {
        Self {
            buffer: StatementBuffer::default(),
            threshold: threshold.max(1),
            session,
            queue,
        }
    }

    /// Append one chunk; commits the current fragment once the accumulated
    /// size reaches the threshold.
    pub(crate) async fn append(&mut self, chunk: &str) {
        self.buffer.append(chunk);

        if self.buffer.fragment().bytes() >= self.threshold {
            self.commit().await;
        }
    }

    /// Final forced flush: submit any remaining complete statements
    /// regardless of the threshold, then mark the stream finished. An empty
    /// fragment is not submitted.
    pub(crate) async fn finish(mut self) {
        self.commit().await;
        self.session.finish_stream();
    }

    async fn commit(&mut self) {
        let fragment = self.buffer.take_fragment();
        if fragment.is_empty() {
            return;
        }

        crate::metrics::record_fragment_commit(fragment.statements(), fragment.bytes());

        let command =
            SubmissionCommand::new(self.session.id(), self.session.graph_uri(), fragment);
        let command_id = command.id();
        let statements = command.statements();
        let bytes = command.bytes();

        // Pending count rises before the queue can possibly report completion.
        self.session.begin_submission();

        if let Err(error) = self.queue.submit(command).await {
            let outcome = SubmissionOutcome {
                command_id,
                session_id: self.session.id().to_string(),
                statements,
                bytes,
                duration: Duration::ZERO,
                result: Err(StoreError::Other(format!(
                    "submission queue unavailable: {error}"
                ))),
            };
            self.session.apply_outcome(&outcome);
        }
    }
}
