//! Run statistics and call recording.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::domain::model::{EndpointId, FlowId, RequestLog, RunId};

/// One finished endpoint call.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub vu_id: u32,
    pub iteration: u64,
    pub step_id: String,
    pub endpoint_id: EndpointId,
    pub status_code: Option<u16>,
    pub success: bool,
    pub message: String,
    pub elapsed: Duration,
    pub started_at: Instant,
    pub raw_body: Option<String>,
}

impl CallRecord {
    pub fn to_request_log(&self, run_id: RunId) -> RequestLog {
        RequestLog {
            run_id,
            endpoint_id: self.endpoint_id,
            step_id: self.step_id.clone(),
            virtual_user: self.vu_id,
            iteration: self.iteration,
            status_code: self.status_code,
            success: self.success,
            response_time_ms: self.elapsed.as_millis() as u64,
            message: self.message.clone(),
            response: self.raw_body.clone(),
        }
    }
}

/// Observer of a run. Called from every virtual-user task; implementations must not block.
pub trait RunRecorder: Send + Sync {
    fn on_virtual_user_started(&self, _vu_id: u32, _at: Instant) {}

    fn on_iteration_finished(&self, _vu_id: u32, _iteration: u64, _ok: bool) {}

    fn record_call(&self, record: &CallRecord);
}

/// Lock-free counters for a single run.
#[derive(Debug)]
pub struct RunStats {
    virtual_users: AtomicU32,
    iterations: AtomicU64,
    failed_iterations: AtomicU64,
    requests: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    total_ms: AtomicU64,
    min_ms: AtomicU64,
    max_ms: AtomicU64,
}

impl Default for RunStats {
    fn default() -> Self {
        Self {
            virtual_users: AtomicU32::new(0),
            iterations: AtomicU64::new(0),
            failed_iterations: AtomicU64::new(0),
            requests: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total_ms: AtomicU64::new(0),
            min_ms: AtomicU64::new(u64::MAX),
            max_ms: AtomicU64::new(0),
        }
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    pub fn summarize(
        &self,
        flow_id: FlowId,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        cancelled: bool,
    ) -> RunSummary {
        let requests = self.requests.load(Ordering::Relaxed);
        let total_ms = self.total_ms.load(Ordering::Relaxed);
        let (min, mean, max) = if requests == 0 {
            (None, None, None)
        } else {
            (
                Some(self.min_ms.load(Ordering::Relaxed)),
                Some(total_ms as f64 / requests as f64),
                Some(self.max_ms.load(Ordering::Relaxed)),
            )
        };
        RunSummary {
            run_id: None,
            flow_id,
            started_at,
            finished_at,
            cancelled,
            virtual_users_started: self.virtual_users.load(Ordering::Relaxed),
            iterations: self.iterations.load(Ordering::Relaxed),
            failed_iterations: self.failed_iterations.load(Ordering::Relaxed),
            requests,
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            min_response_ms: min,
            mean_response_ms: mean,
            max_response_ms: max,
        }
    }
}

impl RunRecorder for RunStats {
    fn on_virtual_user_started(&self, _vu_id: u32, _at: Instant) {
        self.virtual_users.fetch_add(1, Ordering::Relaxed);
    }

    fn on_iteration_finished(&self, _vu_id: u32, _iteration: u64, ok: bool) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failed_iterations.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_call(&self, record: &CallRecord) {
        let ms = record.elapsed.as_millis() as u64;
        self.requests.fetch_add(1, Ordering::Relaxed);
        if record.success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.total_ms.fetch_add(ms, Ordering::Relaxed);
        self.min_ms.fetch_min(ms, Ordering::Relaxed);
        self.max_ms.fetch_max(ms, Ordering::Relaxed);
    }
}

/// Keeps every call and virtual-user start in memory. Grows with the run;
/// long runs stream their calls through `RequestLogWriter` instead.
#[derive(Debug, Default)]
pub struct CallCollector {
    calls: Mutex<Vec<CallRecord>>,
    starts: Mutex<Vec<(u32, Instant)>>,
}

impl CallCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().clone()
    }

    /// Virtual-user start instants, ordered by virtual-user id.
    pub fn starts(&self) -> Vec<(u32, Instant)> {
        let mut starts = self.starts.lock().clone();
        starts.sort_by_key(|(vu, _)| *vu);
        starts
    }

    pub fn drain_calls(&self) -> Vec<CallRecord> {
        std::mem::take(&mut *self.calls.lock())
    }
}

impl RunRecorder for CallCollector {
    fn on_virtual_user_started(&self, vu_id: u32, at: Instant) {
        self.starts.lock().push((vu_id, at));
    }

    fn record_call(&self, record: &CallRecord) {
        self.calls.lock().push(record.clone());
    }
}

/// Forwards every event to each inner recorder.
#[derive(Default)]
pub struct FanoutRecorder {
    recorders: Vec<Arc<dyn RunRecorder>>,
}

impl FanoutRecorder {
    pub fn new(recorders: Vec<Arc<dyn RunRecorder>>) -> Self {
        Self { recorders }
    }
}

impl RunRecorder for FanoutRecorder {
    fn on_virtual_user_started(&self, vu_id: u32, at: Instant) {
        for r in &self.recorders {
            r.on_virtual_user_started(vu_id, at);
        }
    }

    fn on_iteration_finished(&self, vu_id: u32, iteration: u64, ok: bool) {
        for r in &self.recorders {
            r.on_iteration_finished(vu_id, iteration, ok);
        }
    }

    fn record_call(&self, record: &CallRecord) {
        for r in &self.recorders {
            r.record_call(record);
        }
    }
}

/// Result of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    pub flow_id: FlowId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Stopped by an external signal before the deadline.
    pub cancelled: bool,
    pub virtual_users_started: u32,
    pub iterations: u64,
    pub failed_iterations: u64,
    pub requests: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub min_response_ms: Option<u64>,
    pub mean_response_ms: Option<f64>,
    pub max_response_ms: Option<u64>,
}
