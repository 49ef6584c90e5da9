use std::time::Duration;

use metrics::{counter, gauge, histogram};

use crate::store::StoreError;

pub(crate) fn record_submission(
    error: Option<&StoreError>,
    statements: usize,
    bytes: usize,
    duration: Duration,
) {
    let status = if error.is_some() { "error" } else { "ok" };
    let error_class = error.map_or("none", classify_error);

    counter!(
        "ingest_submission_total",
        "status" => status,
        "error_class" => error_class
    )
    .increment(1);
    histogram!("ingest_submission_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());

    if error.is_none() {
        counter!("ingest_submission_statements_total").increment(statements as u64);
        counter!("ingest_submission_bytes_total").increment(bytes as u64);
    }
}

pub(crate) fn record_fragment_commit(statements: usize, bytes: usize) {
    counter!("ingest_fragment_commit_total").increment(1);
    histogram!("ingest_fragment_statements").record(statements as f64);
    histogram!("ingest_fragment_bytes").record(bytes as f64);
}

pub(crate) fn record_queue_depth(depth: usize) {
    gauge!("ingest_queue_pending").set(depth as f64);
}

fn classify_error(error: &StoreError) -> &'static str {
    match error {
        StoreError::Http(_) => "http",
        StoreError::Backend { status, .. } if *status >= 500 => "backend_5xx",
        StoreError::Backend { status, .. } if *status >= 400 => "backend_4xx",
        StoreError::Backend { .. } => "backend_other",
        StoreError::ConnectionFailed { .. } => "connection_failed",
        StoreError::Parse { .. } => "parse_error",
        StoreError::Other(_) => "other",
    }
}
