use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::result::ExecutionResult;
use super::EndpointExecutor;
use crate::core::variable_pool::VariableEnvironment;
use crate::core::virtual_user::CookieJar;
use crate::domain::model::{Endpoint, Protocol};
use crate::template::resolve_json;

/// A templated unary call.
#[derive(Debug, Clone, PartialEq)]
pub struct GrpcRequest {
    pub url: String,
    pub service: String,
    pub method: String,
    pub message: Value,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrpcResponse {
    /// gRPC status code; `0` is OK.
    pub code: u16,
    pub message: String,
    pub body: Value,
}

/// Performs calls for one compiled stub.
#[async_trait]
pub trait GrpcInvoker: Send + Sync {
    async fn invoke(&self, request: GrpcRequest) -> Result<GrpcResponse, String>;
}

/// gRPC calls routed to invokers registered by stub path.
#[derive(Clone, Default)]
pub struct GrpcExecutor {
    invokers: HashMap<String, Arc<dyn GrpcInvoker>>,
}

impl GrpcExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, stub_path: impl Into<String>, invoker: Arc<dyn GrpcInvoker>) -> Self {
        self.invokers.insert(stub_path.into(), invoker);
        self
    }

    fn prepare(&self, endpoint: &Endpoint, env: &VariableEnvironment) -> Result<(Arc<dyn GrpcInvoker>, GrpcRequest), String> {
        let stub = required(endpoint.grpc_stub_path.as_deref(), "grpcStubPath")?;
        let invoker = self
            .invokers
            .get(stub)
            .cloned()
            .ok_or_else(|| format!("No gRPC invoker registered for stub '{}'", stub))?;
        let service = required(endpoint.grpc_service_name.as_deref(), "grpcServiceName")?;
        let method = required(endpoint.grpc_method_name.as_deref(), "grpcMethodName")?;

        let message = match endpoint.http_body.as_ref() {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(Value::String(text)) => serde_json::from_str::<Value>(text)
                .map_err(|e| format!("gRPC request message is not valid JSON: {}", e))?,
            Some(other) => other.clone(),
        };
        let metadata = endpoint.headers()?;

        let request = GrpcRequest {
            url: env.resolve_template(&endpoint.url),
            service: service.to_string(),
            method: method.to_string(),
            message: resolve_json(&message, env),
            metadata: match resolve_json(&Value::Object(metadata), env) {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        };
        Ok((invoker, request))
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("gRPC endpoint is missing {}", field))
}

#[async_trait]
impl EndpointExecutor for GrpcExecutor {
    fn protocol(&self) -> Protocol {
        Protocol::Grpc
    }

    async fn execute(
        &self,
        endpoint: &Endpoint,
        env: &VariableEnvironment,
        _cookies: &Arc<CookieJar>,
    ) -> ExecutionResult {
        let (invoker, request) = match self.prepare(endpoint, env) {
            Ok(prepared) => prepared,
            Err(message) => return ExecutionResult::failed(message, Duration::ZERO),
        };

        tracing::debug!(
            endpoint_id = endpoint.id,
            service = %request.service,
            method = %request.method,
            "Invoking gRPC method"
        );
        let started = Instant::now();
        match invoker.invoke(request).await {
            Ok(response) => ExecutionResult::completed(
                Some(response.code),
                response.code == 0,
                response.message,
                started.elapsed(),
                response.body,
            ),
            Err(e) => ExecutionResult::failed(format!("gRPC call failed: {}", e), started.elapsed()),
        }
    }
}

impl std::fmt::Debug for GrpcExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcExecutor")
            .field("stubs", &self.invokers.keys().collect::<Vec<_>>())
            .finish()
    }
}
