use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Map, Value};

use super::http::{build_headers, build_url, send, RequestBody};
use super::result::ExecutionResult;
use super::EndpointExecutor;
use crate::core::variable_pool::VariableEnvironment;
use crate::core::virtual_user::CookieJar;
use crate::domain::model::{Endpoint, Protocol};
use crate::evaluator::type_coercion::to_string;
use crate::template::{resolve_json, resolve_text};

/// GraphQL over HTTP POST. The endpoint body holds the query document.
#[derive(Debug, Clone)]
pub struct GraphQlExecutor {
    client: reqwest::Client,
}

impl GraphQlExecutor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Build `{"query", "variables"}` with both parts templated.
pub fn build_payload(endpoint: &Endpoint, env: &VariableEnvironment) -> Result<Value, String> {
    let query = match endpoint.http_body.as_ref() {
        None | Some(Value::Null) => return Err("GraphQL endpoint has no query document".to_string()),
        Some(Value::String(text)) => resolve_text(text, env),
        Some(other) => resolve_text(&to_string(other), env),
    };
    let variables: Map<String, Value> = endpoint.graphql_variables()?;
    Ok(json!({
        "query": query,
        "variables": resolve_json(&Value::Object(variables), env),
    }))
}

/// GraphQL reports failures inside a 200 response.
fn graphql_errors(data: &Value) -> Option<String> {
    let errors = data.get("errors")?.as_array().filter(|e| !e.is_empty())?;
    let first = errors[0]
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("GraphQL error");
    Some(format!("{} ({} error(s))", first, errors.len()))
}

#[async_trait]
impl EndpointExecutor for GraphQlExecutor {
    fn protocol(&self) -> Protocol {
        Protocol::GraphQl
    }

    async fn execute(
        &self,
        endpoint: &Endpoint,
        env: &VariableEnvironment,
        cookies: &Arc<CookieJar>,
    ) -> ExecutionResult {
        let prepared = build_payload(endpoint, env).and_then(|payload| {
            let url = build_url(&endpoint.url, &endpoint.parameters()?, env)?;
            let headers = build_headers(&endpoint.headers()?, env)?;
            Ok((url, headers, payload))
        });
        let (url, headers, payload) = match prepared {
            Ok(parts) => parts,
            Err(message) => return ExecutionResult::failed(message, Duration::ZERO),
        };

        tracing::debug!(endpoint_id = endpoint.id, %url, "Sending GraphQL request");
        let result = send(&self.client, Method::POST, url, headers, RequestBody::Json(payload), cookies).await;
        match graphql_errors(result.data()) {
            Some(message) if result.is_success() => result.with_outcome(false, message),
            _ => result,
        }
    }
}
