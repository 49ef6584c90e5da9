#![allow(clippy::unwrap_used)]

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::support::{wait_until, RecordingBackend};
use crate::ingest::{Fragment, StatementBuffer};
use crate::queue::{
    SubmissionCommand, SubmissionExecutor, SubmissionOutcome, SubmissionQueue, QueueError,
};
use crate::store::SparqlBackend;

fn fragment(statements: &[&str]) -> Fragment {
    let mut buffer = StatementBuffer::default();
    for statement in statements {
        buffer.append(statement);
        buffer.append(".\n");
    }
    buffer.take_fragment()
}

fn command(session_id: &str, statements: &[&str]) -> SubmissionCommand {
    SubmissionCommand::new(session_id, None, fragment(statements))
}

fn spawn_queue(
    backend: Arc<dyn SparqlBackend>,
    concurrency: usize,
) -> (SubmissionQueue, mpsc::Receiver<SubmissionOutcome>) {
    let (queue, commands) = SubmissionQueue::channel();
    let (completions_tx, completions_rx) = mpsc::channel(256);

    let executor = SubmissionExecutor::new(
        commands,
        backend,
        completions_tx,
        queue.pending_handle(),
        concurrency,
        Duration::from_secs(5),
        queue.shutdown_token(),
    );
    tokio::spawn(executor.run());

    (queue, completions_rx)
}

async fn recv_outcomes(
    completions: &mut mpsc::Receiver<SubmissionOutcome>,
    count: usize,
) -> Vec<SubmissionOutcome> {
    let mut outcomes = Vec::with_capacity(count);
    for _ in 0..count {
        let outcome = tokio::time::timeout(Duration::from_secs(5), completions.recv())
            .await
            .expect("timed out waiting for outcome")
            .expect("completions channel closed");
        outcomes.push(outcome);
    }
    outcomes
}

#[tokio::test]
async fn serial_queue_never_overlaps_executions() {
    let backend = Arc::new(RecordingBackend::with_hold(Duration::from_millis(20)));
    let (queue, mut completions) = spawn_queue(Arc::clone(&backend) as _, 1);

    for n in 0..5 {
        queue
            .submit(command("urn:test:a", &[&format!("<s{n}> <p>")]))
            .await
            .unwrap();
    }

    recv_outcomes(&mut completions, 5).await;
    assert_eq!(backend.max_observed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrency_window_is_filled_but_never_exceeded() {
    let backend = Arc::new(RecordingBackend::with_hold(Duration::from_millis(100)));
    let (queue, mut completions) = spawn_queue(Arc::clone(&backend) as _, 3);

    for n in 0..9 {
        queue
            .submit(command("urn:test:a", &[&format!("<s{n}> <p>")]))
            .await
            .unwrap();
    }

    recv_outcomes(&mut completions, 9).await;
    assert_eq!(backend.max_observed.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn serial_queue_starts_commands_in_submission_order() {
    let backend = Arc::new(RecordingBackend::new());
    let (queue, mut completions) = spawn_queue(Arc::clone(&backend) as _, 1);

    for n in 0..6 {
        queue
            .submit(command("urn:test:a", &[&format!("<s{n}> <p>")]))
            .await
            .unwrap();
    }

    recv_outcomes(&mut completions, 6).await;

    let updates = backend.updates.lock().clone();
    assert_eq!(updates.len(), 6);
    for (n, update) in updates.iter().enumerate() {
        assert!(update.contains(&format!("<s{n}> <p>.\n")));
    }
}

#[tokio::test]
async fn failure_is_reported_and_the_queue_keeps_processing() {
    let backend = Arc::new(RecordingBackend::new());
    backend.fail_next(1);
    let (queue, mut completions) = spawn_queue(Arc::clone(&backend) as _, 1);

    for n in 0..3 {
        queue
            .submit(command("urn:test:a", &[&format!("<s{n}> <p>")]))
            .await
            .unwrap();
    }

    let outcomes = recv_outcomes(&mut completions, 3).await;
    assert!(outcomes[0].result.is_err());
    assert!(outcomes[1].result.is_ok());
    assert!(outcomes[2].result.is_ok());

    assert_eq!(backend.update_count(), 2);

    let queue_probe = queue.clone();
    wait_until("pending drained", move || queue_probe.pending_len() == 0).await;
}

#[tokio::test]
async fn pending_len_counts_accepted_but_uncompleted_commands() {
    let backend = Arc::new(RecordingBackend::with_hold(Duration::from_millis(50)));
    let (queue, mut completions) = spawn_queue(Arc::clone(&backend) as _, 1);

    queue
        .submit(command("urn:test:a", &["<s1> <p>"]))
        .await
        .unwrap();
    queue
        .submit(command("urn:test:a", &["<s2> <p>"]))
        .await
        .unwrap();

    assert!(queue.pending_len() >= 1);

    recv_outcomes(&mut completions, 2).await;

    let queue_probe = queue.clone();
    wait_until("pending drained", move || queue_probe.pending_len() == 0).await;
}

#[tokio::test]
async fn shutdown_rejects_new_commands_but_drains_queued_ones() {
    let backend = Arc::new(RecordingBackend::with_hold(Duration::from_millis(20)));
    let (queue, mut completions) = spawn_queue(Arc::clone(&backend) as _, 1);

    for n in 0..3 {
        queue
            .submit(command("urn:test:a", &[&format!("<s{n}> <p>")]))
            .await
            .unwrap();
    }

    queue.shutdown();

    let rejected = queue.submit(command("urn:test:a", &["<s9> <p>"])).await;
    assert!(matches!(rejected, Err(QueueError::Closed)));

    let outcomes = recv_outcomes(&mut completions, 3).await;
    assert!(outcomes.iter().all(|outcome| outcome.result.is_ok()));
    assert_eq!(backend.update_count(), 3);
}

#[tokio::test]
async fn command_body_wraps_the_fragment_in_a_graph_when_scoped() {
    let scoped = SubmissionCommand::new(
        "urn:test:a",
        Some("urn:test:graph"),
        fragment(&["<s> <p> <o>"]),
    );
    assert_eq!(
        scoped.body(),
        "INSERT DATA { GRAPH <urn:test:graph> {\n<s> <p> <o>.\n} }\n"
    );

    let unscoped = SubmissionCommand::new("urn:test:a", None, fragment(&["<s> <p> <o>"]));
    assert_eq!(unscoped.body(), "INSERT DATA {\n<s> <p> <o>.\n}\n");

    assert_eq!(scoped.statements(), 1);
    assert_eq!(scoped.bytes(), "<s> <p> <o>.\n".len());
}
