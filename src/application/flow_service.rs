//! Flow use cases: configure the step graph of a flow and run it under load.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;

use crate::core::runtime_context::{IdGenerator, RealIdGenerator};
use crate::core::safe_stop::StopSignal;
use crate::core::stats::{RunRecorder, RunSummary};
use crate::core::variable_pool::VariableEnvironment;
use crate::domain::model::{
    EndpointId, FlowId, FlowStepDto, RequestLog, RunConfig, RunId, RunRecord, RunStatus, StepKind,
};
use crate::error::{FlowError, FlowResult};
use crate::executor::ExecutorSet;
use crate::graph::{build_definition, validate_steps};
use crate::scheduler::{LoadScheduler, RunPlan};
use crate::store::{
    EndpointRepository, EnvironmentRepository, FlowRepository, MemoryStore, ProjectRepository,
    RunRepository,
};

use super::log_writer::RequestLogWriter;

/// The repositories a [`FlowService`] reads and writes.
#[derive(Clone)]
pub struct Repositories {
    pub flows: Arc<dyn FlowRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub endpoints: Arc<dyn EndpointRepository>,
    pub environments: Arc<dyn EnvironmentRepository>,
    pub runs: Arc<dyn RunRepository>,
}

impl Repositories {
    /// Every repository backed by the same [`MemoryStore`].
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            flows: store.clone(),
            projects: store.clone(),
            endpoints: store.clone(),
            environments: store.clone(),
            runs: store,
        }
    }
}

pub struct FlowService {
    repos: Repositories,
    scheduler: LoadScheduler,
    ids: Arc<dyn IdGenerator>,
    run_slots: Arc<Semaphore>,
}

impl FlowService {
    /// `max_concurrent_runs` runs may be in flight; further ones fail with `SystemBusy`.
    pub fn new(repos: Repositories, executors: Arc<ExecutorSet>, max_concurrent_runs: usize) -> Self {
        Self {
            repos,
            scheduler: LoadScheduler::new(executors),
            ids: Arc::new(RealIdGenerator),
            run_slots: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// 配置流程步骤
    ///
    /// Validates the whole submission before writing anything, gives every step
    /// a fresh id and rewrites the edges to match. The stored steps are replaced
    /// in one write. Returns the stored steps, START first, then by id.
    pub async fn configure_flow(&self, flow_id: FlowId, steps: Vec<FlowStepDto>) -> FlowResult<Vec<FlowStepDto>> {
        self.repos
            .flows
            .find_flow(flow_id)
            .await?
            .ok_or(FlowError::FlowNotFound(flow_id))?;

        let referenced: HashSet<EndpointId> = steps.iter().filter_map(|s| s.endpoint_id).collect();
        let mut known = HashSet::with_capacity(referenced.len());
        for id in referenced {
            if self.repos.endpoints.endpoint_exists(id).await? {
                known.insert(id);
            }
        }
        validate_steps(&steps, |id| known.contains(&id))?;

        let id_map: HashMap<&str, String> = steps
            .iter()
            .map(|s| (s.id.as_str(), self.ids.next_id()))
            .collect();
        let remap = |old: Option<&str>| old.and_then(|id| id_map.get(id).cloned());

        let mut stored: Vec<FlowStepDto> = steps
            .iter()
            .map(|dto| FlowStepDto {
                id: id_map.get(dto.id.as_str()).cloned().unwrap_or_default(),
                kind: dto.kind.clone(),
                endpoint_id: dto.endpoint_id,
                pre_processor: dto.pre_processor.clone(),
                post_processor: dto.post_processor.clone(),
                next_if_true: remap(dto.next_true()),
                next_if_false: remap(dto.next_false()),
                condition: dto.condition.clone(),
            })
            .collect();
        sort_steps(&mut stored);

        self.repos.flows.replace_steps(flow_id, stored.clone()).await?;
        tracing::info!(flow_id, steps = stored.len(), "Flow configured");
        Ok(stored)
    }

    pub async fn run_flow(&self, flow_id: FlowId, config: RunConfig) -> FlowResult<RunSummary> {
        self.run_flow_until(flow_id, config, StopSignal::new()).await
    }

    /// Run a configured flow. Triggering `stop` ends the run early; the run is
    /// then recorded as aborted.
    pub async fn run_flow_until(
        &self,
        flow_id: FlowId,
        config: RunConfig,
        stop: StopSignal,
    ) -> FlowResult<RunSummary> {
        let flow = self
            .repos
            .flows
            .find_flow(flow_id)
            .await?
            .ok_or(FlowError::FlowNotFound(flow_id))?;
        let project = self
            .repos
            .projects
            .find_project(flow.project_id)
            .await?
            .ok_or(FlowError::ProjectNotFound(flow.project_id))?;

        let steps = self.repos.flows.flow_steps(flow_id).await?;
        if steps.is_empty() {
            return Err(FlowError::FlowNotConfigured(flow_id));
        }
        let definition = build_definition(flow_id, &steps)?;

        let endpoint_ids: Vec<EndpointId> = definition
            .steps()
            .filter_map(|s| s.endpoint_id())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let endpoints = self.repos.endpoints.find_endpoints(&endpoint_ids).await?;
        for id in endpoint_ids.iter().filter(|id| !endpoints.contains_key(*id)) {
            tracing::warn!(flow_id, endpoint_id = *id, "Endpoint no longer exists, steps using it will fail");
        }

        let mut base_env = VariableEnvironment::new();
        if let Some(environment_id) = project.environment_id {
            for variable in self.repos.environments.active_variables(environment_id).await? {
                base_env.set(variable.key, variable.value);
            }
        }
        base_env.merge(config.variables());

        let _permit = self
            .run_slots
            .clone()
            .try_acquire_owned()
            .map_err(|_| FlowError::SystemBusy)?;

        let mut run = self
            .repos
            .runs
            .create_run(RunRecord {
                id: 0,
                flow_id,
                status: RunStatus::Running,
                threads: config.threads(),
                duration: config.total_duration_secs(),
                ramp_up_duration: config.ramp_up_secs(),
                started_at: Utc::now(),
                finished_at: None,
            })
            .await?;

        let (writer, flusher) = RequestLogWriter::spawn(run.id, self.repos.runs.clone());
        let plan = RunPlan {
            definition: Arc::new(definition),
            endpoints: Arc::new(endpoints),
            base_env,
        };
        let recorder: Arc<dyn RunRecorder> = writer.clone();
        let mut summary = self.scheduler.run(plan, &config, recorder, stop).await;

        let written = flusher.finish().await;
        if writer.dropped() > 0 {
            tracing::warn!(
                run_id = run.id,
                written,
                dropped = writer.dropped(),
                "Request log channel was full, some calls were not logged"
            );
        }

        run.status = if summary.cancelled {
            RunStatus::Aborted
        } else {
            RunStatus::Completed
        };
        run.finished_at = Some(summary.finished_at);
        self.repos.runs.update_run(&run).await?;

        summary.run_id = Some(run.id);
        Ok(summary)
    }

    pub async fn run_record(&self, run_id: RunId) -> FlowResult<Option<RunRecord>> {
        Ok(self.repos.runs.find_run(run_id).await?)
    }

    pub async fn request_logs(&self, run_id: RunId) -> FlowResult<Vec<RequestLog>> {
        Ok(self.repos.runs.request_logs(run_id).await?)
    }
}

/// START first, then by id.
fn sort_steps(steps: &mut [FlowStepDto]) {
    steps.sort_by(|a, b| {
        (a.kind != StepKind::Start)
            .cmp(&(b.kind != StepKind::Start))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::http_client::{HttpClientProvider, HttpPoolConfig};
    use crate::core::runtime_context::FakeIdGenerator;
    use crate::domain::model::{Endpoint, Flow, Project};

    async fn service(max_runs: usize) -> (FlowService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_project(Project {
                id: 1,
                name: "p".into(),
                environment_id: None,
            })
            .await;
        store
            .insert_flow(Flow {
                id: 7,
                project_id: 1,
                name: "f".into(),
                description: None,
            })
            .await;
        store
            .insert_flow(Flow {
                id: 8,
                project_id: 99,
                name: "orphan".into(),
                description: None,
            })
            .await;
        store.insert_endpoint(Endpoint::http(1, "GET", "http://localhost/1")).await;

        let provider = HttpClientProvider::new(HttpPoolConfig::default()).unwrap();
        let executors = Arc::new(ExecutorSet::new(&provider));
        let service = FlowService::new(Repositories::memory(store.clone()), executors, max_runs)
            .with_id_generator(Arc::new(FakeIdGenerator::new("step")));
        (service, store)
    }

    fn submission() -> Vec<FlowStepDto> {
        vec![
            FlowStepDto::endpoint("zz-call", 1).with_next(Some("b"), None),
            FlowStepDto::branch("b", "retry == true", "zz-call", "done"),
            FlowStepDto::start("begin", "zz-call"),
            FlowStepDto::endpoint("done", 1),
        ]
    }

    #[tokio::test]
    async fn test_configure_remaps_and_sorts() {
        let (service, store) = service(1).await;
        let stored = service.configure_flow(7, submission()).await.unwrap();

        assert_eq!(stored[0].kind, StepKind::Start);
        let ids: Vec<_> = stored.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["step-2", "step-0", "step-1", "step-3"]);

        // zz-call -> step-0, b -> step-1, begin -> step-2, done -> step-3
        assert_eq!(stored[0].next_if_true.as_deref(), Some("step-0"));
        let branch = stored.iter().find(|s| s.id == "step-1").unwrap();
        assert_eq!(branch.next_if_true.as_deref(), Some("step-0"));
        assert_eq!(branch.next_if_false.as_deref(), Some("step-3"));

        assert_eq!(store.flow_steps(7).await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_configure_rejects_without_writing() {
        let (service, store) = service(1).await;
        service.configure_flow(7, submission()).await.unwrap();
        let before = store.flow_steps(7).await.unwrap();

        let bad = vec![FlowStepDto::start("s", "e"), FlowStepDto::endpoint("e", 404)];
        assert!(matches!(
            service.configure_flow(7, bad).await,
            Err(FlowError::EndpointNotFound { endpoint_id: 404, .. })
        ));
        assert_eq!(store.flow_steps(7).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_configure_unknown_flow() {
        let (service, _) = service(1).await;
        assert!(matches!(
            service.configure_flow(42, submission()).await,
            Err(FlowError::FlowNotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_run_lookup_errors() {
        let (service, _) = service(1).await;
        let config = RunConfig::new(1, 1, 0).unwrap();
        assert!(matches!(
            service.run_flow(42, config.clone()).await,
            Err(FlowError::FlowNotFound(42))
        ));
        assert!(matches!(
            service.run_flow(8, config.clone()).await,
            Err(FlowError::ProjectNotFound(99))
        ));
        assert!(matches!(
            service.run_flow(7, config).await,
            Err(FlowError::FlowNotConfigured(7))
        ));
    }

    #[test]
    fn test_sort_steps() {
        let mut steps = vec![
            FlowStepDto::endpoint("b", 1),
            FlowStepDto::endpoint("a", 1),
            FlowStepDto::start("z", "a"),
        ];
        sort_steps(&mut steps);
        let ids: Vec<_> = steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "b"]);
    }
}
