use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{EndpointId, ProjectId};
use crate::error::FlowError;

/// Supported endpoint protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Http,
    Grpc,
    #[serde(rename = "GRAPHQL")]
    GraphQl,
}

impl FromStr for Protocol {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HTTP" => Ok(Protocol::Http),
            "GRPC" => Ok(Protocol::Grpc),
            "GRAPHQL" => Ok(Protocol::GraphQl),
            _ => Err(FlowError::UnsupportedProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => f.write_str("HTTP"),
            Protocol::Grpc => f.write_str("GRPC"),
            Protocol::GraphQl => f.write_str("GRAPHQL"),
        }
    }
}

/// Protocol-tagged request template.
///
/// Headers, query parameters and GraphQL variables may be given either as JSON
/// objects or as strings holding a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Endpoint {
    pub id: EndpointId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub endpoint_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    pub url: String,

    // HTTP
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_headers: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_parameters: Option<Value>,

    // gRPC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grpc_service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grpc_method_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grpc_stub_path: Option<String>,

    // GraphQL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphql_operation_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphql_variables: Option<Value>,
}

impl Endpoint {
    pub fn http(id: EndpointId, method: &str, url: impl Into<String>) -> Self {
        Self {
            id,
            name: format!("endpoint-{}", id),
            endpoint_type: Protocol::Http.to_string(),
            url: url.into(),
            http_method: Some(method.to_string()),
            ..Default::default()
        }
    }

    pub fn protocol(&self) -> Result<Protocol, FlowError> {
        self.endpoint_type.parse()
    }

    pub fn with_headers(mut self, headers: Value) -> Self {
        self.http_headers = Some(headers);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.http_body = Some(body);
        self
    }

    pub fn with_parameters(mut self, params: Value) -> Self {
        self.http_parameters = Some(params);
        self
    }

    pub fn headers(&self) -> Result<Map<String, Value>, String> {
        json_object(self.http_headers.as_ref(), "httpHeaders")
    }

    pub fn parameters(&self) -> Result<Map<String, Value>, String> {
        json_object(self.http_parameters.as_ref(), "httpParameters")
    }

    pub fn graphql_variables(&self) -> Result<Map<String, Value>, String> {
        json_object(self.graphql_variables.as_ref(), "graphqlVariables")
    }

    /// HTTP method, upper-cased, defaulting to GET.
    pub fn method(&self) -> String {
        self.http_method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_ascii_uppercase)
            .unwrap_or_else(|| "GET".to_string())
    }
}

fn json_object(value: Option<&Value>, field: &str) -> Result<Map<String, Value>, String> {
    match value {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Map::new()),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(format!("{} must be a JSON object", field)),
            Err(e) => Err(format!("{} is not valid JSON: {}", field, e)),
        },
        Some(_) => Err(format!("{} must be a JSON object", field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_protocol_parse() {
        assert_eq!("http".parse::<Protocol>().unwrap(), Protocol::Http);
        assert_eq!("GraphQL".parse::<Protocol>().unwrap(), Protocol::GraphQl);
        assert!(matches!(
            "SOAP".parse::<Protocol>(),
            Err(FlowError::UnsupportedProtocol(_))
        ));
    }

    #[test]
    fn test_headers_from_json_string() {
        let ep = Endpoint::http(1, "get", "http://x").with_headers(json!("{\"X-A\": \"1\"}"));
        assert_eq!(ep.headers().unwrap().get("X-A"), Some(&json!("1")));
        assert_eq!(ep.method(), "GET");
    }

    #[test]
    fn test_headers_invalid() {
        let ep = Endpoint::http(1, "GET", "http://x").with_headers(json!("[1]"));
        assert!(ep.headers().is_err());
    }

    #[test]
    fn test_deserialize_endpoint() {
        let ep: Endpoint = serde_json::from_value(json!({
            "id": 9,
            "name": "login",
            "type": "HTTP",
            "url": "{{baseUrl}}/login",
            "httpMethod": "post",
            "httpBody": {"user": "{{user}}"}
        }))
        .unwrap();
        assert_eq!(ep.protocol().unwrap(), Protocol::Http);
        assert_eq!(ep.method(), "POST");
        assert!(ep.parameters().unwrap().is_empty());
    }
}
