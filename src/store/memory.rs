use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    EndpointRepository, EnvironmentRepository, FlowRepository, ProjectRepository, RunRepository,
    StoreError, StoreResult,
};
use crate::domain::model::{
    Endpoint, EndpointId, EnvironmentId, EnvironmentVariable, Flow, FlowId, FlowStepDto, Project,
    ProjectId, RequestLog, RunId, RunRecord,
};

/// In-process store for every repository.
#[derive(Debug)]
pub struct MemoryStore {
    projects: RwLock<HashMap<ProjectId, Project>>,
    flows: RwLock<HashMap<FlowId, Flow>>,
    steps: RwLock<HashMap<FlowId, Vec<FlowStepDto>>>,
    endpoints: RwLock<HashMap<EndpointId, Endpoint>>,
    variables: RwLock<Vec<EnvironmentVariable>>,
    runs: RwLock<HashMap<RunId, RunRecord>>,
    logs: RwLock<Vec<RequestLog>>,
    next_run_id: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
            flows: RwLock::new(HashMap::new()),
            steps: RwLock::new(HashMap::new()),
            endpoints: RwLock::new(HashMap::new()),
            variables: RwLock::new(Vec::new()),
            runs: RwLock::new(HashMap::new()),
            logs: RwLock::new(Vec::new()),
            next_run_id: AtomicI64::new(1),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_project(&self, project: Project) {
        self.projects.write().await.insert(project.id, project);
    }

    pub async fn insert_flow(&self, flow: Flow) {
        self.flows.write().await.insert(flow.id, flow);
    }

    pub async fn insert_endpoint(&self, endpoint: Endpoint) {
        self.endpoints.write().await.insert(endpoint.id, endpoint);
    }

    pub async fn insert_variable(&self, variable: EnvironmentVariable) {
        self.variables.write().await.push(variable);
    }
}

#[async_trait]
impl FlowRepository for MemoryStore {
    async fn find_flow(&self, id: FlowId) -> StoreResult<Option<Flow>> {
        Ok(self.flows.read().await.get(&id).cloned())
    }

    async fn flow_steps(&self, flow_id: FlowId) -> StoreResult<Vec<FlowStepDto>> {
        Ok(self.steps.read().await.get(&flow_id).cloned().unwrap_or_default())
    }

    async fn replace_steps(&self, flow_id: FlowId, steps: Vec<FlowStepDto>) -> StoreResult<()> {
        if !self.flows.read().await.contains_key(&flow_id) {
            return Err(StoreError::NotFound(format!("flow {}", flow_id)));
        }
        self.steps.write().await.insert(flow_id, steps);
        Ok(())
    }
}

#[async_trait]
impl ProjectRepository for MemoryStore {
    async fn find_project(&self, id: ProjectId) -> StoreResult<Option<Project>> {
        Ok(self.projects.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl EndpointRepository for MemoryStore {
    async fn find_endpoint(&self, id: EndpointId) -> StoreResult<Option<Endpoint>> {
        Ok(self.endpoints.read().await.get(&id).cloned())
    }

    async fn endpoint_exists(&self, id: EndpointId) -> StoreResult<bool> {
        Ok(self.endpoints.read().await.contains_key(&id))
    }
}

#[async_trait]
impl EnvironmentRepository for MemoryStore {
    async fn active_variables(&self, environment_id: EnvironmentId) -> StoreResult<Vec<EnvironmentVariable>> {
        Ok(self
            .variables
            .read()
            .await
            .iter()
            .filter(|v| v.environment_id == environment_id && v.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RunRepository for MemoryStore {
    async fn create_run(&self, mut run: RunRecord) -> StoreResult<RunRecord> {
        run.id = self.next_run_id.fetch_add(1, Ordering::SeqCst);
        self.runs.write().await.insert(run.id, run.clone());
        Ok(run)
    }

    async fn update_run(&self, run: &RunRecord) -> StoreResult<()> {
        match self.runs.write().await.get_mut(&run.id) {
            Some(existing) => {
                *existing = run.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("run {}", run.id))),
        }
    }

    async fn find_run(&self, id: RunId) -> StoreResult<Option<RunRecord>> {
        Ok(self.runs.read().await.get(&id).cloned())
    }

    async fn append_request_logs(&self, logs: Vec<RequestLog>) -> StoreResult<()> {
        self.logs.write().await.extend(logs);
        Ok(())
    }

    async fn request_logs(&self, run_id: RunId) -> StoreResult<Vec<RequestLog>> {
        Ok(self
            .logs
            .read()
            .await
            .iter()
            .filter(|log| log.run_id == run_id)
            .cloned()
            .collect())
    }
}
