use std::sync::Arc;

use mockito::Matcher;
use serde_json::json;

use flowpilot::core::CookieJar;
use flowpilot::executor::GraphQlExecutor;
use flowpilot::{
    Endpoint, EndpointExecutor, ExecutorSet, HttpClientProvider, HttpPoolConfig, Protocol,
    VariableEnvironment,
};

fn executors() -> ExecutorSet {
    let provider = HttpClientProvider::new(HttpPoolConfig::default()).unwrap();
    ExecutorSet::new(&provider)
}

fn env(base_url: &str) -> VariableEnvironment {
    VariableEnvironment::from_value(json!({
        "baseUrl": base_url,
        "user": "alice",
        "token": "t0k",
        "page": 2,
    }))
}

#[tokio::test]
async fn test_post_with_templated_json_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/login")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({"user": "alice", "remember": true})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token": "abc"}"#)
        .create_async()
        .await;

    let endpoint = Endpoint::http(1, "POST", "{{baseUrl}}/login")
        .with_body(json!({"user": "{{user}}", "remember": true}));
    let result = executors()
        .execute(&endpoint, &env(&server.url()), &Arc::new(CookieJar::default()))
        .await;

    mock.assert_async().await;
    assert!(result.is_success());
    assert_eq!(result.status_code(), Some(200));
    assert_eq!(result.data(), &json!({"token": "abc"}));
}

#[tokio::test]
async fn test_query_parameters_and_headers_are_templated() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/items")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), "2".into()),
            Matcher::UrlEncoded("owner".into(), "alice".into()),
        ]))
        .match_header("authorization", "Bearer t0k")
        .with_status(200)
        .with_body("[1, 2, 3]")
        .create_async()
        .await;

    let endpoint = Endpoint::http(2, "get", "{{baseUrl}}/items")
        .with_parameters(json!({"page": "{{page}}", "owner": "{{user}}"}))
        .with_headers(json!("{\"Authorization\": \"Bearer {{token}}\"}"));
    let result = executors()
        .execute(&endpoint, &env(&server.url()), &Arc::new(CookieJar::default()))
        .await;

    mock.assert_async().await;
    assert!(result.is_success());
    assert_eq!(result.data(), &json!([1, 2, 3]));
}

#[tokio::test]
async fn test_get_sends_no_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/ping")
        .match_body(Matcher::Exact(String::new()))
        .with_status(204)
        .create_async()
        .await;

    let endpoint = Endpoint::http(3, "GET", "{{baseUrl}}/ping").with_body(json!({"ignored": true}));
    let result = executors()
        .execute(&endpoint, &env(&server.url()), &Arc::new(CookieJar::default()))
        .await;

    mock.assert_async().await;
    assert!(result.is_success());
    assert_eq!(result.status_code(), Some(204));
}

#[tokio::test]
async fn test_server_error_is_a_failed_call() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("DELETE", "/orders/7")
        .with_status(500)
        .with_body(r#"{"error": "boom"}"#)
        .create_async()
        .await;

    let endpoint = Endpoint::http(4, "DELETE", "{{baseUrl}}/orders/7");
    let result = executors()
        .execute(&endpoint, &env(&server.url()), &Arc::new(CookieJar::default()))
        .await;

    assert!(!result.is_success());
    assert_eq!(result.status_code(), Some(500));
    assert_eq!(result.message(), "Internal Server Error");
    assert_eq!(result.data()["error"], "boom");
}

#[tokio::test]
async fn test_cookies_round_trip_within_one_jar() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/session")
        .with_status(200)
        .with_header("set-cookie", "sid=s3cr3t; Path=/")
        .with_body("{}")
        .create_async()
        .await;
    let with_cookie = server
        .mock("GET", "/me")
        .match_header("cookie", "sid=s3cr3t")
        .with_status(200)
        .with_body(r#"{"name": "alice"}"#)
        .create_async()
        .await;

    let executors = executors();
    let env = env(&server.url());
    let jar = Arc::new(CookieJar::default());
    let login = Endpoint::http(5, "POST", "{{baseUrl}}/session");
    let me = Endpoint::http(6, "GET", "{{baseUrl}}/me");

    assert!(executors.execute(&login, &env, &jar).await.is_success());
    let result = executors.execute(&me, &env, &jar).await;
    with_cookie.assert_async().await;
    assert!(result.is_success());

    // a different virtual user has its own jar
    let stranger = executors.execute(&me, &env, &Arc::new(CookieJar::default())).await;
    assert_eq!(stranger.status_code(), Some(501));
}

#[tokio::test]
async fn test_unreachable_target() {
    let endpoint = Endpoint::http(7, "GET", "http://127.0.0.1:1/down");
    let result = executors()
        .execute(&endpoint, &VariableEnvironment::new(), &Arc::new(CookieJar::default()))
        .await;

    assert!(!result.is_success());
    assert_eq!(result.status_code(), None);
    assert!(result.message().starts_with("IO Error"), "{}", result.message());
}

#[tokio::test]
async fn test_invalid_url_fails_without_sending() {
    let endpoint = Endpoint::http(8, "GET", "{{missing}}/path");
    let result = executors()
        .execute(&endpoint, &VariableEnvironment::new(), &Arc::new(CookieJar::default()))
        .await;
    assert!(!result.is_success());
    assert!(result.message().starts_with("Invalid URL"));
}

#[tokio::test]
async fn test_graphql_query_and_errors() {
    let mut server = mockito::Server::new_async().await;
    let ok = server
        .mock("POST", "/graphql")
        .match_body(Matcher::Json(json!({
            "query": "query { user(name: \"alice\") { id } }",
            "variables": {"limit": "2"}
        })))
        .with_status(200)
        .with_body(r#"{"data": {"user": {"id": 1}}}"#)
        .create_async()
        .await;

    let endpoint = Endpoint {
        id: 9,
        endpoint_type: Protocol::GraphQl.to_string(),
        url: "{{baseUrl}}/graphql".into(),
        http_body: Some(json!("query { user(name: \"{{user}}\") { id } }")),
        graphql_variables: Some(json!({"limit": "{{page}}"})),
        ..Default::default()
    };
    let provider = HttpClientProvider::new(HttpPoolConfig::default()).unwrap();
    let executor = GraphQlExecutor::new(provider.client());
    let jar = Arc::new(CookieJar::default());
    let env = env(&server.url());

    let result = executor.execute(&endpoint, &env, &jar).await;
    ok.assert_async().await;
    assert!(result.is_success());
    assert_eq!(result.data()["data"]["user"]["id"], 1);

    server.reset_async().await;
    server
        .mock("POST", "/graphql")
        .with_status(200)
        .with_body(r#"{"errors": [{"message": "denied"}, {"message": "again"}]}"#)
        .create_async()
        .await;
    let result = executor.execute(&endpoint, &env, &jar).await;
    assert!(!result.is_success());
    assert_eq!(result.status_code(), Some(200));
    assert_eq!(result.message(), "denied (2 error(s))");
}
