use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::cookie::CookieStore;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::{Method, Url};
use serde_json::{Map, Value};

use super::result::ExecutionResult;
use super::EndpointExecutor;
use crate::core::variable_pool::VariableEnvironment;
use crate::core::virtual_user::CookieJar;
use crate::domain::model::{Endpoint, Protocol};
use crate::evaluator::type_coercion::to_string;
use crate::template::{resolve_json, resolve_text};

/// Request body after templating
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Text(String),
}

impl RequestBody {
    /// A body that parses as a JSON object or array is substituted structurally;
    /// anything else is templated as text.
    pub fn from_template(body: Option<&Value>, env: &VariableEnvironment) -> Self {
        match body {
            None | Some(Value::Null) => RequestBody::Empty,
            Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
                Ok(parsed) if parsed.is_object() || parsed.is_array() => {
                    RequestBody::Json(resolve_json(&parsed, env))
                }
                _ if text.is_empty() => RequestBody::Empty,
                _ => RequestBody::Text(resolve_text(text, env)),
            },
            Some(other) => RequestBody::Json(resolve_json(other, env)),
        }
    }
}

/// Resolve URL template and append templated query parameters
pub fn build_url(
    template: &str,
    params: &Map<String, Value>,
    env: &VariableEnvironment,
) -> Result<Url, String> {
    let text = resolve_text(template, env);
    let mut url = Url::parse(text.trim()).map_err(|e| format!("Invalid URL '{}': {}", text, e))?;
    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(&resolve_text(key, env), &resolve_text(&to_string(value), env));
        }
    }
    Ok(url)
}

pub fn build_headers(headers: &Map<String, Value>, env: &VariableEnvironment) -> Result<HeaderMap, String> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (key, value) in headers {
        let name = HeaderName::from_bytes(resolve_text(key, env).trim().as_bytes())
            .map_err(|e| format!("Invalid header name '{}': {}", key, e))?;
        let resolved = resolve_text(&to_string(value), env);
        let value = HeaderValue::from_str(&resolved)
            .map_err(|e| format!("Invalid value for header '{}': {}", key, e))?;
        map.append(name, value);
    }
    Ok(map)
}

/// Send one request with the virtual user's cookies and store the cookies it sets.
///
/// Never fails: transport errors become a failed [`ExecutionResult`].
pub async fn send(
    client: &reqwest::Client,
    method: Method,
    url: Url,
    mut headers: HeaderMap,
    body: RequestBody,
    cookies: &Arc<CookieJar>,
) -> ExecutionResult {
    if let Some(cookie) = cookies.cookies(&url) {
        headers.append(COOKIE, cookie);
    }

    let mut request = client.request(method.clone(), url.clone());
    let allows_body = method != Method::GET && method != Method::HEAD;
    match body {
        RequestBody::Json(value) if allows_body => {
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            request = request.body(value.to_string());
        }
        RequestBody::Text(text) if allows_body => {
            request = request.body(text);
        }
        _ => {}
    }
    let request = request.headers(headers);

    let started = Instant::now();
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => return transport_error(e, started.elapsed()),
    };

    let status = response.status();
    let mut set_cookies = response.headers().get_all(SET_COOKIE).iter();
    cookies.set_cookies(&mut set_cookies, &url);

    match response.text().await {
        Ok(body) => ExecutionResult::from_response(
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            started.elapsed(),
            body,
        ),
        Err(e) => transport_error(e, started.elapsed()),
    }
}

fn transport_error(e: reqwest::Error, elapsed: Duration) -> ExecutionResult {
    let kind = if e.is_timeout() { "Timeout" } else { "IO Error" };
    ExecutionResult::failed(format!("{}: {}", kind, e), elapsed)
}

/// Executes HTTP endpoints on the shared pooled client.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EndpointExecutor for HttpExecutor {
    fn protocol(&self) -> Protocol {
        Protocol::Http
    }

    async fn execute(
        &self,
        endpoint: &Endpoint,
        env: &VariableEnvironment,
        cookies: &Arc<CookieJar>,
    ) -> ExecutionResult {
        let prepared = (|| {
            let method = Method::from_bytes(endpoint.method().as_bytes())
                .map_err(|_| format!("Invalid HTTP method '{}'", endpoint.method()))?;
            let url = build_url(&endpoint.url, &endpoint.parameters()?, env)?;
            let headers = build_headers(&endpoint.headers()?, env)?;
            let body = RequestBody::from_template(endpoint.http_body.as_ref(), env);
            Ok::<_, String>((method, url, headers, body))
        })();

        let (method, url, headers, body) = match prepared {
            Ok(parts) => parts,
            Err(message) => return ExecutionResult::failed(message, Duration::ZERO),
        };

        tracing::debug!(endpoint_id = endpoint.id, %method, %url, "Sending HTTP request");
        send(&self.client, method, url, headers, body, cookies).await
    }
}
