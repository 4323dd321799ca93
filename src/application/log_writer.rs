//! Request-log streaming.
//!
//! Virtual users hand every finished call to a [`RequestLogWriter`], which
//! pushes it into a bounded channel without blocking. A writer task drains the
//! channel and stores the logs in batches, so memory stays bounded by the
//! channel capacity instead of growing with the length of the run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::safe_stop::StopSignal;
use crate::core::stats::{CallRecord, RunRecorder};
use crate::domain::model::{RequestLog, RunId};
use crate::store::RunRepository;

pub const LOG_CHANNEL_CAPACITY: usize = 4096;
pub const LOG_BATCH_SIZE: usize = 256;
/// Stored response bodies are cut to this many bytes.
pub const MAX_LOGGED_BODY: usize = 4096;

/// Recorder side of the stream. Never blocks a virtual user: when the channel
/// is full the log is dropped and counted.
pub struct RequestLogWriter {
    run_id: RunId,
    tx: mpsc::Sender<RequestLog>,
    dropped: AtomicU64,
}

/// Handle on the writer task.
pub struct LogFlusher {
    done: StopSignal,
    task: JoinHandle<u64>,
}

impl RequestLogWriter {
    pub fn spawn(run_id: RunId, runs: Arc<dyn RunRepository>) -> (Arc<Self>, LogFlusher) {
        Self::spawn_with_capacity(run_id, runs, LOG_CHANNEL_CAPACITY)
    }

    pub fn spawn_with_capacity(
        run_id: RunId,
        runs: Arc<dyn RunRepository>,
        capacity: usize,
    ) -> (Arc<Self>, LogFlusher) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let done = StopSignal::new();
        let task = tokio::spawn(write_loop(rx, runs, run_id, done.clone()));
        let writer = Arc::new(Self {
            run_id,
            tx,
            dropped: AtomicU64::new(0),
        });
        (writer, LogFlusher { done, task })
    }

    /// Logs lost because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl RunRecorder for RequestLogWriter {
    fn record_call(&self, record: &CallRecord) {
        let mut log = record.to_request_log(self.run_id);
        if let Some(body) = log.response.as_mut() {
            truncate_body(body, MAX_LOGGED_BODY);
        }
        if self.tx.try_send(log).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl LogFlusher {
    /// Stop accepting logs, store what is buffered and return the number of
    /// logs written over the whole run.
    pub async fn finish(self) -> u64 {
        self.done.trigger();
        match self.task.await {
            Ok(written) => written,
            Err(e) => {
                tracing::error!(error = %e, "Request log writer failed");
                0
            }
        }
    }
}

async fn write_loop(
    mut rx: mpsc::Receiver<RequestLog>,
    runs: Arc<dyn RunRepository>,
    run_id: RunId,
    done: StopSignal,
) -> u64 {
    let mut written = 0;
    let mut batch = Vec::with_capacity(LOG_BATCH_SIZE);
    let mut closing = false;

    loop {
        let received = if closing {
            rx.recv().await
        } else {
            tokio::select! {
                biased;
                log = rx.recv() => log,
                _ = done.cancelled() => {
                    // buffered logs are still delivered after close
                    rx.close();
                    closing = true;
                    continue;
                }
            }
        };
        let Some(first) = received else { break };

        batch.push(first);
        while batch.len() < LOG_BATCH_SIZE {
            match rx.try_recv() {
                Ok(log) => batch.push(log),
                Err(_) => break,
            }
        }

        let logs = std::mem::take(&mut batch);
        let count = logs.len() as u64;
        match runs.append_request_logs(logs).await {
            Ok(()) => written += count,
            Err(e) => tracing::warn!(run_id, count, error = %e, "Failed to store request logs"),
        }
    }

    written
}

/// Cut `body` to at most `max` bytes on a char boundary.
fn truncate_body(body: &mut String, max: usize) {
    if body.len() <= max {
        return;
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body.truncate(end);
}
