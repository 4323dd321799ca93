use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockito::Matcher;
use serde_json::json;

use flowpilot::core::CookieJar;
use flowpilot::domain::model::{EnvironmentVariable, Flow, Project, RunStatus};
use flowpilot::{
    Endpoint, EndpointExecutor, ExecutionResult, ExecutorSet, FlowError, FlowService, FlowStepDto,
    HttpClientProvider, HttpPoolConfig, MemoryStore, Protocol, Repositories, RunConfig, StepKind,
    StopSignal, VariableEnvironment,
};

const FLOW: i64 = 1;

async fn store_with(endpoints: Vec<Endpoint>, environment: Vec<EnvironmentVariable>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_project(Project {
            id: 1,
            name: "shop".into(),
            environment_id: Some(10),
        })
        .await;
    store
        .insert_flow(Flow {
            id: FLOW,
            project_id: 1,
            name: "checkout".into(),
            description: None,
        })
        .await;
    for endpoint in endpoints {
        store.insert_endpoint(endpoint).await;
    }
    for variable in environment {
        store.insert_variable(variable).await;
    }
    store
}

fn service(store: Arc<MemoryStore>, executors: ExecutorSet, max_runs: usize) -> FlowService {
    FlowService::new(Repositories::memory(store), Arc::new(executors), max_runs)
}

fn http_executors() -> ExecutorSet {
    let provider = HttpClientProvider::new(HttpPoolConfig::default()).unwrap();
    ExecutorSet::new(&provider)
}

fn variable(key: &str, value: serde_json::Value, is_active: bool) -> EnvironmentVariable {
    EnvironmentVariable {
        environment_id: 10,
        key: key.into(),
        value,
        is_active,
    }
}

#[tokio::test]
async fn test_configure_assigns_fresh_ids() {
    let store = store_with(vec![Endpoint::http(100, "GET", "http://localhost/a")], vec![]).await;
    let service = service(store, http_executors(), 1);

    let stored = service
        .configure_flow(
            FLOW,
            vec![
                FlowStepDto::endpoint("call", 100).with_next(Some("check"), None),
                FlowStepDto::branch("check", "attempts < 3", "call", "end"),
                FlowStepDto::start("begin", "call"),
                FlowStepDto::endpoint("end", 100),
            ],
        )
        .await
        .unwrap();

    assert_eq!(stored.len(), 4);
    assert_eq!(stored[0].kind, StepKind::Start);
    let ids: Vec<&str> = stored.iter().map(|s| s.id.as_str()).collect();
    for old in ["call", "check", "begin", "end"] {
        assert!(!ids.contains(&old), "step id {} was kept", old);
    }
    for step in &stored {
        for target in [step.next_true(), step.next_false()].into_iter().flatten() {
            assert!(ids.contains(&target), "dangling edge {}", target);
        }
    }
    let mut rest: Vec<&str> = ids[1..].to_vec();
    rest.sort();
    assert_eq!(rest, ids[1..].to_vec());
}

#[tokio::test]
async fn test_configure_rejections() {
    let store = store_with(vec![Endpoint::http(100, "GET", "http://localhost/a")], vec![]).await;
    let service = service(store, http_executors(), 1);

    let two_starts = vec![
        FlowStepDto::start("a", "e"),
        FlowStepDto::start("b", "e"),
        FlowStepDto::endpoint("e", 100),
    ];
    assert!(matches!(
        service.configure_flow(FLOW, two_starts).await,
        Err(FlowError::StartCardinality(2))
    ));

    let endless = vec![
        FlowStepDto::start("s", "loop"),
        FlowStepDto::branch("loop", "true", "call", "call"),
        FlowStepDto::endpoint("call", 100).with_next(Some("loop"), Some("loop")),
    ];
    assert!(matches!(
        service.configure_flow(FLOW, endless).await,
        Err(FlowError::NoTerminalStep) | Err(FlowError::NonTerminating { .. })
    ));

    let bad_condition = vec![
        FlowStepDto::start("s", "b"),
        FlowStepDto::branch("b", "x ==", "e", "e"),
        FlowStepDto::endpoint("e", 100),
    ];
    assert!(matches!(
        service.configure_flow(FLOW, bad_condition).await,
        Err(FlowError::InvalidStep { step_id, .. }) if step_id == "b"
    ));

    let unknown_endpoint = vec![FlowStepDto::start("s", "e"), FlowStepDto::endpoint("e", 5)];
    assert!(matches!(
        service.configure_flow(FLOW, unknown_endpoint).await,
        Err(FlowError::EndpointNotFound { endpoint_id: 5, .. })
    ));
}

#[tokio::test]
async fn test_http_flow_end_to_end() {
    let mut server = mockito::Server::new_async().await;
    let login = server
        .mock("POST", "/login")
        .match_body(Matcher::Json(json!({"user": "alice", "tenant": "{{tenant}}"})))
        .with_status(200)
        .with_header("set-cookie", "sid=1; Path=/")
        .with_body(r#"{"data": {"token": "abc"}}"#)
        .expect_at_least(1)
        .create_async()
        .await;
    let profile = server
        .mock("GET", "/profile")
        .match_header("authorization", "Bearer abc")
        .match_header("cookie", "sid=1")
        .with_status(200)
        .with_body(r#"{"name": "alice"}"#)
        .expect_at_least(1)
        .create_async()
        .await;

    let login_endpoint = Endpoint::http(100, "POST", "{{baseUrl}}/login")
        .with_body(json!({"user": "{{user}}", "tenant": "{{tenant}}"}));
    let profile_endpoint = Endpoint::http(101, "GET", "{{baseUrl}}/profile")
        .with_headers(json!({"Authorization": "Bearer {{token}}"}));
    let store = store_with(
        vec![login_endpoint, profile_endpoint],
        vec![
            variable("baseUrl", json!(server.url()), true),
            variable("tenant", json!("acme"), false),
        ],
    )
    .await;
    let service = service(store, http_executors(), 2);
    service
        .configure_flow(
            FLOW,
            vec![
                FlowStepDto::start("s", "login"),
                FlowStepDto::endpoint("login", 100)
                    .with_next(Some("profile"), None)
                    .with_post_processor(json!({"extract": {"token": "data.token"}})),
                FlowStepDto::endpoint("profile", 101).with_pre_processor(json!({"sleep": 50})),
            ],
        )
        .await
        .unwrap();

    let config = RunConfig::new(2, 1, 0).unwrap().with_variable("user", json!("alice"));
    let summary = service.run_flow(FLOW, config).await.unwrap();

    login.assert_async().await;
    profile.assert_async().await;
    assert!(!summary.cancelled);
    assert_eq!(summary.virtual_users_started, 2);
    assert!(summary.requests >= 2);
    assert_eq!(summary.failed, 0);

    let run_id = summary.run_id.unwrap();
    let record = service.run_record(run_id).await.unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Completed);
    assert!(record.finished_at.is_some());
    assert_eq!((record.threads, record.duration), (2, 1));

    let logs = service.request_logs(run_id).await.unwrap();
    assert_eq!(logs.len() as u64, summary.requests);
    assert!(logs.iter().all(|log| log.success && log.run_id == run_id));
    assert!(logs.iter().any(|log| log.endpoint_id == 101));
}

/// Answers every call after a fixed delay.
struct Slow;

#[async_trait]
impl EndpointExecutor for Slow {
    fn protocol(&self) -> Protocol {
        Protocol::Http
    }

    async fn execute(
        &self,
        _endpoint: &Endpoint,
        _env: &VariableEnvironment,
        _cookies: &Arc<CookieJar>,
    ) -> ExecutionResult {
        tokio::time::sleep(Duration::from_millis(100)).await;
        ExecutionResult::completed(Some(200), true, "OK", Duration::from_millis(100), json!({}))
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_run_limit_and_abort() {
    let store = store_with(vec![Endpoint::http(100, "GET", "http://test/slow")], vec![]).await;
    let service = Arc::new(service(store, http_executors().with_executor(Arc::new(Slow)), 1));
    service
        .configure_flow(FLOW, vec![FlowStepDto::start("s", "e"), FlowStepDto::endpoint("e", 100)])
        .await
        .unwrap();

    let stop = StopSignal::new();
    let first = tokio::spawn({
        let service = service.clone();
        let stop = stop.clone();
        async move {
            service
                .run_flow_until(FLOW, RunConfig::new(2, 60, 0).unwrap(), stop)
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert!(matches!(
        service.run_flow(FLOW, RunConfig::new(1, 1, 0).unwrap()).await,
        Err(FlowError::SystemBusy)
    ));

    stop.trigger();
    let summary = first.await.unwrap().unwrap();
    assert!(summary.cancelled);
    assert!(summary.requests > 0);
    let record = service.run_record(summary.run_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Aborted);

    // the slot is free again
    let summary = service.run_flow(FLOW, RunConfig::new(1, 1, 0).unwrap()).await.unwrap();
    assert!(!summary.cancelled);
    assert_ne!(summary.run_id, Some(record.id));
}
