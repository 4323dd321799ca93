//! Load scheduler.
//!
//! [`LoadScheduler`] starts one tokio task per virtual user, spaced over the
//! ramp-up window, and keeps each of them iterating the flow until the run's
//! deadline or until an external [`StopSignal`] fires. A timer task enforces
//! the deadline by triggering the run's stop signal and aborting the workers.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;

use crate::core::dispatcher::{IterationEnd, StepDispatcher};
use crate::core::safe_stop::StopSignal;
use crate::core::stats::{FanoutRecorder, RunRecorder, RunStats, RunSummary};
use crate::core::variable_pool::VariableEnvironment;
use crate::core::virtual_user::VirtualUserContext;
use crate::domain::model::{Endpoint, EndpointId, RunConfig};
use crate::executor::ExecutorSet;
use crate::graph::FlowDefinition;

/// Everything a run needs besides its configuration.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub definition: Arc<FlowDefinition>,
    pub endpoints: Arc<HashMap<EndpointId, Endpoint>>,
    pub base_env: VariableEnvironment,
}

/// 负载调度器
#[derive(Debug, Clone)]
pub struct LoadScheduler {
    executors: Arc<ExecutorSet>,
}

impl LoadScheduler {
    pub fn new(executors: Arc<ExecutorSet>) -> Self {
        Self { executors }
    }

    /// Delay between the starts of two consecutive virtual users.
    pub fn start_delay(config: &RunConfig) -> Duration {
        Duration::from_millis(config.ramp_up_secs() * 1000 / u64::from(config.threads()))
    }

    /// Run `plan` under `config` and return once every virtual user has stopped.
    ///
    /// `recorder` observes every call in addition to the built-in statistics.
    /// Triggering `stop` ends the run early and marks the summary cancelled.
    pub async fn run(
        &self,
        plan: RunPlan,
        config: &RunConfig,
        recorder: Arc<dyn RunRecorder>,
        stop: StopSignal,
    ) -> RunSummary {
        let flow_id = plan.definition.flow_id;
        let started_at = Utc::now();
        let t0 = Instant::now();
        let delay = Self::start_delay(config);
        let deadline = t0 + Duration::from_secs(config.total_duration_secs());

        // the run's own signal: fired by the timer, or by `stop` through the parent link
        let run_stop = stop.child();
        let stats = Arc::new(RunStats::new());
        let recorders: Vec<Arc<dyn RunRecorder>> = vec![stats.clone(), recorder];
        let recorder: Arc<dyn RunRecorder> = Arc::new(FanoutRecorder::new(recorders));
        let dispatcher = StepDispatcher::new(
            plan.definition,
            plan.endpoints,
            self.executors.clone(),
            recorder.clone(),
            run_stop.clone(),
            deadline,
        );
        let base_env = Arc::new(plan.base_env);

        tracing::info!(
            flow_id,
            threads = config.threads(),
            duration_secs = config.total_duration_secs(),
            ramp_up_secs = config.ramp_up_secs(),
            start_delay_ms = delay.as_millis() as u64,
            "Run started"
        );

        let workers: Vec<JoinHandle<()>> = (0..config.threads())
            .map(|vu| {
                let start_at = t0 + delay * vu;
                tokio::spawn(run_virtual_user(
                    vu,
                    start_at,
                    dispatcher.clone(),
                    recorder.clone(),
                    base_env.clone(),
                ))
            })
            .collect();

        let abort_handles: Vec<AbortHandle> = workers.iter().map(JoinHandle::abort_handle).collect();
        let timer = tokio::spawn(deadline_timer(deadline, run_stop.clone(), abort_handles));

        for worker in workers {
            match worker.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => tracing::error!(flow_id, error = %e, "Virtual user task failed"),
            }
        }
        timer.abort();

        let cancelled = stop.is_triggered();
        let summary = stats.summarize(flow_id, started_at, Utc::now(), cancelled);
        tracing::info!(
            flow_id,
            cancelled,
            virtual_users = summary.virtual_users_started,
            iterations = summary.iterations,
            requests = summary.requests,
            failed = summary.failed,
            "Run finished"
        );
        summary
    }
}

/// Fires once at the deadline. Exits early when the run is stopped by other means.
async fn deadline_timer(deadline: Instant, stop: StopSignal, workers: Vec<AbortHandle>) {
    tokio::select! {
        _ = tokio::time::sleep_until(deadline) => {
            tracing::info!("Deadline reached, stopping virtual users");
            stop.trigger();
            for worker in &workers {
                worker.abort();
            }
        }
        _ = stop.cancelled() => {}
    }
}

async fn run_virtual_user(
    vu: u32,
    start_at: Instant,
    dispatcher: StepDispatcher,
    recorder: Arc<dyn RunRecorder>,
    base_env: Arc<VariableEnvironment>,
) {
    let wait = start_at.saturating_duration_since(Instant::now());
    if !wait.is_zero() && !dispatcher.stop_signal().sleep(wait).await {
        return;
    }
    if dispatcher.should_stop() {
        return;
    }

    recorder.on_virtual_user_started(vu, Instant::now());
    tracing::info!(vu, "Virtual user started");

    let mut ctx = VirtualUserContext::new(vu, &base_env);
    while !dispatcher.should_stop() {
        let iteration = ctx.next_iteration();
        let outcome = AssertUnwindSafe(dispatcher.run_iteration(&mut ctx))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(report)) => {
                if report.end == IterationEnd::Completed {
                    recorder.on_iteration_finished(vu, iteration, report.is_ok());
                }
            }
            Ok(Err(e)) => {
                tracing::error!(vu, iteration, error = %e, "Iteration aborted");
                recorder.on_iteration_finished(vu, iteration, false);
            }
            Err(panic) => {
                tracing::error!(vu, iteration, panic = %panic_message(&*panic), "Iteration panicked");
                recorder.on_iteration_finished(vu, iteration, false);
            }
        }
        tokio::task::yield_now().await;
    }

    tracing::info!(vu, iterations = ctx.iteration(), "Virtual user finished");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
