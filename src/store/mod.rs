//! Repository traits for flows, projects, endpoints, environments and runs.
//!
//! [`MemoryStore`] implements all of them and backs the CLI and the tests.

mod memory;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::model::{
    Endpoint, EndpointId, EnvironmentId, EnvironmentVariable, Flow, FlowId, FlowStepDto, Project,
    ProjectId, RequestLog, RunId, RunRecord,
};
use crate::error::{FlowError, StepError};

pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Record not found: {0}")]
    NotFound(String),
}

impl From<StoreError> for FlowError {
    fn from(e: StoreError) -> Self {
        FlowError::StoreError(e.to_string())
    }
}

impl From<StoreError> for StepError {
    fn from(e: StoreError) -> Self {
        StepError::StoreError(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait FlowRepository: Send + Sync {
    async fn find_flow(&self, id: FlowId) -> StoreResult<Option<Flow>>;

    async fn flow_steps(&self, flow_id: FlowId) -> StoreResult<Vec<FlowStepDto>>;

    /// Swap the whole step list of a flow in one write.
    async fn replace_steps(&self, flow_id: FlowId, steps: Vec<FlowStepDto>) -> StoreResult<()>;
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn find_project(&self, id: ProjectId) -> StoreResult<Option<Project>>;
}

#[async_trait]
pub trait EndpointRepository: Send + Sync {
    async fn find_endpoint(&self, id: EndpointId) -> StoreResult<Option<Endpoint>>;

    async fn endpoint_exists(&self, id: EndpointId) -> StoreResult<bool> {
        Ok(self.find_endpoint(id).await?.is_some())
    }

    /// Endpoints for `ids`; unknown ids are left out.
    async fn find_endpoints(&self, ids: &[EndpointId]) -> StoreResult<HashMap<EndpointId, Endpoint>> {
        let mut found = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(endpoint) = self.find_endpoint(*id).await? {
                found.insert(*id, endpoint);
            }
        }
        Ok(found)
    }
}

#[async_trait]
pub trait EnvironmentRepository: Send + Sync {
    /// Active variables of an environment, in insertion order.
    async fn active_variables(&self, environment_id: EnvironmentId) -> StoreResult<Vec<EnvironmentVariable>>;
}

#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Store a new run and return it with its assigned id.
    async fn create_run(&self, run: RunRecord) -> StoreResult<RunRecord>;

    async fn update_run(&self, run: &RunRecord) -> StoreResult<()>;

    async fn find_run(&self, id: RunId) -> StoreResult<Option<RunRecord>>;

    async fn append_request_logs(&self, logs: Vec<RequestLog>) -> StoreResult<()>;

    async fn request_logs(&self, run_id: RunId) -> StoreResult<Vec<RequestLog>>;
}
