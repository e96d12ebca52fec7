use async_trait::async_trait;
use nodeflow::{
    clients::{HttpClient, HttpRequest, HttpResponse, MailError, Mailer, TransportError},
    workflow::{ExecutionError, Graph, RuntimeStatus, StepExecutor, WorkflowEngine},
};
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Answers every request with `{"v": <n>}` where n counts calls, and keeps
/// the requested URLs.
#[derive(Default)]
struct CountingHttp {
    urls: Mutex<Vec<String>>,
}

#[async_trait]
impl HttpClient for CountingHttp {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut urls = self.urls.lock().unwrap();
        urls.push(request.url);
        Ok(HttpResponse {
            status: 200,
            body: json!({ "v": urls.len() }).to_string(),
        })
    }
}

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl Mailer for Outbox {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

fn engine(http: Arc<CountingHttp>, outbox: Arc<Outbox>) -> WorkflowEngine {
    WorkflowEngine::new(Arc::new(StepExecutor::new(http, outbox)))
}

const SCENARIO_YAML: &str = r#"
nodes:
  - id: s
    type: start
    position: { x: 0, y: 0 }
  - id: a
    type: apiCall
    data:
      url: https://api.example.com/items
      method: get
  - id: e
    type: sendEmail
    data:
      to: ops@example.com
      subject: "Item {{ a.data.v }} ready"
  - id: z
    type: end
edges:
  - { id: e1, source: s, target: a }
  - { id: e2, source: a, target: e }
  - { id: e3, source: e, target: z }
"#;

#[tokio::test]
async fn test_yaml_scenario_runs_end_to_end() {
    let graph: Graph = serde_yaml::from_str(SCENARIO_YAML).unwrap();
    let http = Arc::new(CountingHttp::default());
    let outbox = Arc::new(Outbox::default());

    let trace = engine(http.clone(), outbox.clone()).execute(&graph).await;

    assert!(trace.success, "{}", trace.message);
    assert_eq!(trace.execution_order, vec!["s", "a", "e", "z"]);
    for id in ["s", "a", "e", "z"] {
        assert_eq!(trace.node_status(id), Some(RuntimeStatus::Passed));
    }
    assert_eq!(trace.payload("a").unwrap()["data"], json!({ "v": 1 }));

    let sent = outbox.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "ops@example.com");
    assert_eq!(sent[0].1, "Item 1 ready");
    // Without an explicit body the accumulated context is mailed
    let mailed: serde_json::Value = serde_json::from_str(&sent[0].2).unwrap();
    assert_eq!(mailed["a"]["data"]["v"], 1);

    assert!(trace.final_context.contains("s"));
    assert!(trace.final_context.contains("a"));
    assert!(trace.final_context.contains("e"));

    // The input graph is left untouched
    assert!(graph.nodes.iter().all(|n| n.runtime_status == RuntimeStatus::Idle));
}

#[tokio::test]
async fn test_chained_api_calls_read_earlier_results() {
    let graph: Graph = serde_json::from_value(json!({
        "nodes": [
            { "id": "s", "type": "start" },
            { "id": "first", "type": "apiCall", "data": { "url": "https://api.example.com/a" } },
            { "id": "second", "type": "apiCall", "data": { "url": "https://api.example.com/b/{{ first.data.v }}" } },
            { "id": "z", "type": "end" }
        ],
        "edges": [
            { "id": "e1", "source": "s", "target": "first" },
            { "id": "e2", "source": "first", "target": "second" },
            { "id": "e3", "source": "second", "target": "z" }
        ]
    }))
    .unwrap();
    let http = Arc::new(CountingHttp::default());

    let trace = engine(http.clone(), Arc::new(Outbox::default())).execute(&graph).await;

    assert!(trace.success);
    assert_eq!(
        http.urls.lock().unwrap().as_slice(),
        &["https://api.example.com/a".to_string(), "https://api.example.com/b/1".to_string()]
    );
}

#[tokio::test]
async fn test_rerun_and_concurrent_runs_are_independent() {
    let graph: Graph = serde_yaml::from_str(SCENARIO_YAML).unwrap();
    let outbox = Arc::new(Outbox::default());

    // Fresh collaborators per run so payloads line up
    let first = engine(Arc::new(CountingHttp::default()), outbox.clone()).execute(&graph).await;
    let second = engine(Arc::new(CountingHttp::default()), outbox.clone()).execute(&graph).await;
    assert_eq!(first, second);

    let shared = engine(Arc::new(CountingHttp::default()), outbox.clone());
    let (left, right) = tokio::join!(shared.execute(&graph), shared.execute(&graph));
    assert!(left.success && right.success);
    assert_eq!(left.execution_order, right.execution_order);
    assert_eq!(outbox.sent.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_cycle_is_reported_instead_of_hanging() {
    let graph: Graph = serde_json::from_value(json!({
        "nodes": [
            { "id": "s", "type": "start" },
            { "id": "a", "type": "condition" },
            { "id": "b", "type": "textAnnotation", "data": { "text": "loop" } }
        ],
        "edges": [
            { "id": "e1", "source": "s", "target": "a" },
            { "id": "e2", "source": "a", "target": "b" },
            { "id": "e3", "source": "b", "target": "a" }
        ]
    }))
    .unwrap();

    let trace = engine(Arc::new(CountingHttp::default()), Arc::new(Outbox::default()))
        .execute(&graph)
        .await;

    assert!(!trace.success);
    assert_eq!(trace.message, ExecutionError::CycleDetected("a".to_string()).to_string());
    assert_eq!(trace.failed_node.as_deref(), Some("a"));
    assert!(graph.validate().is_ok());
}
