//! Step dispatcher: walks one iteration of a flow for one virtual user.
//!
//! The [`StepDispatcher`] starts at the START step and follows edges until a
//! step has nowhere to go. ENDPOINT steps run their pre-processor, call the
//! endpoint through the [`ExecutorSet`], report the call and run their
//! post-processor. BRANCH steps evaluate their condition against the virtual
//! user's environment.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::time::Instant;

use crate::core::safe_stop::StopSignal;
use crate::core::stats::{CallRecord, RunRecorder};
use crate::core::virtual_user::VirtualUserContext;
use crate::domain::model::{Endpoint, EndpointId, FlowStep, StepKind};
use crate::error::{StepError, StepResult};
use crate::evaluator::evaluate_condition;
use crate::executor::{ExecutionResult, ExecutorSet};
use crate::graph::FlowDefinition;
use crate::processor;

/// Why an iteration stopped walking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationEnd {
    /// Reached a step with no successor.
    Completed,
    /// The stop signal fired.
    Stopped,
    DeadlineReached,
}

/// 单次迭代的执行报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationReport {
    pub end: IterationEnd,
    /// Step ids in visiting order.
    pub path: Vec<String>,
    pub calls: usize,
    pub failed_calls: usize,
}

impl IterationReport {
    fn new() -> Self {
        Self {
            end: IterationEnd::Completed,
            path: Vec::new(),
            calls: 0,
            failed_calls: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.failed_calls == 0
    }
}

enum Transition<'a> {
    Goto(&'a str),
    Done,
    Interrupted,
}

/// Shared, read-only traversal state for every virtual user of a run.
#[derive(Clone)]
pub struct StepDispatcher {
    definition: Arc<FlowDefinition>,
    endpoints: Arc<HashMap<EndpointId, Endpoint>>,
    executors: Arc<ExecutorSet>,
    recorder: Arc<dyn RunRecorder>,
    stop: StopSignal,
    deadline: Instant,
}

impl StepDispatcher {
    pub fn new(
        definition: Arc<FlowDefinition>,
        endpoints: Arc<HashMap<EndpointId, Endpoint>>,
        executors: Arc<ExecutorSet>,
        recorder: Arc<dyn RunRecorder>,
        stop: StopSignal,
        deadline: Instant,
    ) -> Self {
        Self {
            definition,
            endpoints,
            executors,
            recorder,
            stop,
            deadline,
        }
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Stop signal fired or deadline passed.
    pub fn should_stop(&self) -> bool {
        self.stop.is_triggered() || Instant::now() >= self.deadline
    }

    fn interruption(&self) -> IterationEnd {
        if Instant::now() >= self.deadline {
            IterationEnd::DeadlineReached
        } else {
            IterationEnd::Stopped
        }
    }

    /// Run one pass from START. The caller advances the iteration counter.
    pub async fn run_iteration(&self, ctx: &mut VirtualUserContext) -> StepResult<IterationReport> {
        let mut report = IterationReport::new();
        let mut previous: Option<Value> = None;
        let mut current = self
            .definition
            .start_step()
            .ok_or_else(|| StepError::StepNotFound("START".to_string()))?;

        loop {
            if self.should_stop() {
                report.end = self.interruption();
                return Ok(report);
            }
            report.path.push(current.id().to_string());

            let transition = match current.kind() {
                StepKind::Start => next_or_done(current.next_if_true()),
                StepKind::Endpoint => {
                    self.visit_endpoint(current, ctx, &mut previous, &mut report)
                        .await?
                }
                StepKind::Branch => {
                    let condition = current.condition().unwrap_or_default();
                    let taken = evaluate_condition(condition, ctx.env());
                    tracing::debug!(
                        vu = ctx.vu_id(),
                        iteration = ctx.iteration(),
                        step_id = current.id(),
                        condition,
                        taken,
                        "Branch evaluated"
                    );
                    if taken {
                        next_or_done(current.next_if_true())
                    } else {
                        next_or_done(current.next_if_false())
                    }
                }
                StepKind::Unknown(kind) => {
                    return Err(StepError::UnknownStepKind {
                        step_id: current.id().to_string(),
                        kind: kind.clone(),
                    });
                }
            };

            match transition {
                Transition::Goto(next) => {
                    current = self
                        .definition
                        .get_step(next)
                        .ok_or_else(|| StepError::StepNotFound(next.to_string()))?;
                    // START and BRANCH never await; a branch cycle must not hold the worker thread
                    tokio::task::yield_now().await;
                }
                Transition::Done => {
                    report.end = IterationEnd::Completed;
                    return Ok(report);
                }
                Transition::Interrupted => {
                    report.end = self.interruption();
                    return Ok(report);
                }
            }
        }
    }

    async fn visit_endpoint<'a>(
        &self,
        step: &'a FlowStep,
        ctx: &mut VirtualUserContext,
        previous: &mut Option<Value>,
        report: &mut IterationReport,
    ) -> StepResult<Transition<'a>> {
        if let Some(pre) = step.pre_processor() {
            let outcome = processor::apply(pre, ctx.env_mut(), previous.as_ref(), &self.stop).await;
            if outcome.interrupted {
                return Ok(Transition::Interrupted);
            }
        }

        let endpoint_id = step.endpoint_id().ok_or_else(|| {
            StepError::InternalError(format!("ENDPOINT step {} has no endpoint", step.id()))
        })?;
        let endpoint = self
            .endpoints
            .get(&endpoint_id)
            .ok_or(StepError::EndpointNotFound(endpoint_id))?;

        let started = Instant::now();
        let result = match self.call(endpoint, ctx).await {
            Some(result) => result,
            None => return Ok(Transition::Interrupted),
        };

        tracing::debug!(
            vu = ctx.vu_id(),
            iteration = ctx.iteration(),
            step_id = step.id(),
            endpoint_id,
            status = ?result.status_code(),
            success = result.is_success(),
            elapsed_ms = result.elapsed().as_millis() as u64,
            "Endpoint call finished"
        );
        report.calls += 1;
        if !result.is_success() {
            report.failed_calls += 1;
        }
        self.recorder.record_call(&CallRecord {
            vu_id: ctx.vu_id(),
            iteration: ctx.iteration(),
            step_id: step.id().to_string(),
            endpoint_id,
            status_code: result.status_code(),
            success: result.is_success(),
            message: result.message().to_string(),
            elapsed: result.elapsed(),
            started_at: started,
            raw_body: result.raw_body().map(str::to_string),
        });

        if let Some(post) = step.post_processor() {
            let outcome = processor::apply(post, ctx.env_mut(), Some(result.data()), &self.stop).await;
            if outcome.interrupted {
                return Ok(Transition::Interrupted);
            }
        }

        let next = match step.next_if_true() {
            Some(next) if result.is_success() => Some(next),
            _ => step.next_if_false(),
        };
        *previous = Some(result.data().clone());
        Ok(next_or_done(next))
    }

    /// The call races the stop signal and the deadline. `None` when either wins.
    async fn call(&self, endpoint: &Endpoint, ctx: &VirtualUserContext) -> Option<ExecutionResult> {
        tokio::select! {
            biased;
            _ = self.stop.cancelled() => None,
            _ = tokio::time::sleep_until(self.deadline) => None,
            result = self.executors.execute(endpoint, ctx.env(), ctx.cookies()) => Some(result),
        }
    }
}

fn next_or_done(next: Option<&str>) -> Transition<'_> {
    match next {
        Some(id) => Transition::Goto(id),
        None => Transition::Done,
    }
}

impl std::fmt::Debug for StepDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDispatcher")
            .field("flow_id", &self.definition.flow_id)
            .field("endpoints", &self.endpoints.len())
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}
