//! Protocol executors.
//!
//! Every executor turns one [`Endpoint`] plus the calling virtual user's
//! environment and cookies into an [`ExecutionResult`]. Execution never
//! returns an error; failures are results with `success == false`.

pub mod graphql;
pub mod grpc;
pub mod http;
pub mod result;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::http_client::HttpClientProvider;
use crate::core::variable_pool::VariableEnvironment;
use crate::core::virtual_user::CookieJar;
use crate::domain::model::{Endpoint, Protocol};

pub use graphql::GraphQlExecutor;
pub use grpc::{GrpcExecutor, GrpcInvoker, GrpcRequest, GrpcResponse};
pub use http::HttpExecutor;
pub use result::ExecutionResult;

/// 端点执行器 trait
#[async_trait]
pub trait EndpointExecutor: Send + Sync {
    fn protocol(&self) -> Protocol;

    async fn execute(
        &self,
        endpoint: &Endpoint,
        env: &VariableEnvironment,
        cookies: &Arc<CookieJar>,
    ) -> ExecutionResult;
}

/// One executor per protocol, chosen by the endpoint's type tag.
#[derive(Clone)]
pub struct ExecutorSet {
    http: Arc<dyn EndpointExecutor>,
    grpc: Arc<dyn EndpointExecutor>,
    graphql: Arc<dyn EndpointExecutor>,
}

impl ExecutorSet {
    /// HTTP and GraphQL share the pooled client; gRPC starts with no invokers.
    pub fn new(provider: &HttpClientProvider) -> Self {
        let client = provider.client();
        Self {
            http: Arc::new(HttpExecutor::new(client.clone())),
            grpc: Arc::new(GrpcExecutor::new()),
            graphql: Arc::new(GraphQlExecutor::new(client)),
        }
    }

    pub fn with_grpc(mut self, executor: GrpcExecutor) -> Self {
        self.grpc = Arc::new(executor);
        self
    }

    /// Replace the executor for the protocol it reports.
    pub fn with_executor(mut self, executor: Arc<dyn EndpointExecutor>) -> Self {
        match executor.protocol() {
            Protocol::Http => self.http = executor,
            Protocol::Grpc => self.grpc = executor,
            Protocol::GraphQl => self.graphql = executor,
        }
        self
    }

    pub fn get(&self, protocol: Protocol) -> &Arc<dyn EndpointExecutor> {
        match protocol {
            Protocol::Http => &self.http,
            Protocol::Grpc => &self.grpc,
            Protocol::GraphQl => &self.graphql,
        }
    }

    /// Dispatch on the endpoint's protocol. An unknown tag fails this call only.
    pub async fn execute(
        &self,
        endpoint: &Endpoint,
        env: &VariableEnvironment,
        cookies: &Arc<CookieJar>,
    ) -> ExecutionResult {
        match endpoint.protocol() {
            Ok(protocol) => self.get(protocol).execute(endpoint, env, cookies).await,
            Err(e) => {
                tracing::warn!(endpoint_id = endpoint.id, error = %e, "Skipping endpoint");
                ExecutionResult::failed(e.to_string(), Duration::ZERO)
            }
        }
    }
}

impl std::fmt::Debug for ExecutorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorSet").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::http_client::HttpPoolConfig;
    use serde_json::json;

    struct Canned(Protocol);

    #[async_trait]
    impl EndpointExecutor for Canned {
        fn protocol(&self) -> Protocol {
            self.0
        }

        async fn execute(
            &self,
            _endpoint: &Endpoint,
            _env: &VariableEnvironment,
            _cookies: &Arc<CookieJar>,
        ) -> ExecutionResult {
            ExecutionResult::completed(Some(200), true, "canned", Duration::ZERO, json!({"ok": true}))
        }
    }

    fn set() -> ExecutorSet {
        let provider = HttpClientProvider::new(HttpPoolConfig::default()).unwrap();
        ExecutorSet::new(&provider)
    }

    #[tokio::test]
    async fn test_unknown_protocol_fails_call() {
        let mut endpoint = Endpoint::http(1, "GET", "http://localhost");
        endpoint.endpoint_type = "SOAP".into();
        let result = set()
            .execute(&endpoint, &VariableEnvironment::new(), &Arc::new(CookieJar::default()))
            .await;
        assert!(!result.is_success());
        assert!(result.message().contains("SOAP"));
    }

    #[tokio::test]
    async fn test_dispatch_by_protocol() {
        let set = set().with_executor(Arc::new(Canned(Protocol::Grpc)));
        let mut endpoint = Endpoint::http(1, "GET", "http://localhost");
        endpoint.endpoint_type = "grpc".into();
        let result = set
            .execute(&endpoint, &VariableEnvironment::new(), &Arc::new(CookieJar::default()))
            .await;
        assert!(result.is_success());
        assert_eq!(result.message(), "canned");
    }
}
