use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::{
    clients::{HttpClient, HttpRequest, Mailer},
    template::render_template,
    workflow::{ExecutionContext, ExecutionError, Node, NodeKind},
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCallConfig {
    pub url: String,

    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// JSON body, sent for methods other than GET and HEAD
    #[serde(default)]
    pub body: Option<Value>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SendEmailConfig {
    pub to: String,

    #[serde(default)]
    pub subject: String,

    /// Defaults to the JSON-serialized context when absent
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TextAnnotationConfig {
    #[serde(default)]
    pub text: String,
}

/// A node resolved into its typed step. Adding a node kind means adding a
/// variant here, and the dispatch in `StepExecutor::execute` will not compile
/// until it is handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Start,
    End,
    ApiCall(ApiCallConfig),
    SendEmail(SendEmailConfig),
    TextAnnotation(TextAnnotationConfig),
    Condition,
}

impl Step {
    pub fn from_node(node: &Node) -> Result<Self, ExecutionError> {
        match &node.kind {
            NodeKind::Start => Ok(Step::Start),
            NodeKind::End => Ok(Step::End),
            NodeKind::Condition => Ok(Step::Condition),
            NodeKind::ApiCall => serde_json::from_value(node.config.clone())
                .map(Step::ApiCall)
                .map_err(|e| ExecutionError::ApiCallFailed {
                    node_id: node.id.clone(),
                    reason: format!("invalid configuration: {}", e),
                }),
            NodeKind::SendEmail => serde_json::from_value(node.config.clone())
                .map(Step::SendEmail)
                .map_err(|e| ExecutionError::EmailFailed {
                    node_id: node.id.clone(),
                    reason: format!("invalid configuration: {}", e),
                }),
            // Annotations never fail; malformed config reads as empty text.
            NodeKind::TextAnnotation => Ok(Step::TextAnnotation(
                serde_json::from_value(node.config.clone()).unwrap_or_default(),
            )),
            NodeKind::Other(kind) => Err(ExecutionError::UnknownNodeKind {
                node_id: node.id.clone(),
                kind: kind.clone(),
            }),
        }
    }
}

pub struct StepExecutor {
    http: Arc<dyn HttpClient>,
    mailer: Arc<dyn Mailer>,
    default_timeout: Duration,
}

impl StepExecutor {
    pub fn new(http: Arc<dyn HttpClient>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            http,
            mailer,
            default_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Runs one node against the context accumulated by its ancestors and
    /// returns the node's payload.
    pub async fn execute(&self, node: &Node, context: &ExecutionContext) -> Result<Value, ExecutionError> {
        debug!("Executing node: {} (type: {})", node.id, node.kind);

        match Step::from_node(node)? {
            Step::Start | Step::End | Step::Condition => Ok(json!({ "status": "success" })),
            Step::TextAnnotation(config) => Ok(json!({
                "status": "success",
                "text": config.text,
            })),
            Step::ApiCall(config) => self.execute_api_call(&node.id, config, context).await,
            Step::SendEmail(config) => self.execute_send_email(&node.id, config, context).await,
        }
    }

    async fn execute_api_call(
        &self,
        node_id: &str,
        config: ApiCallConfig,
        context: &ExecutionContext,
    ) -> Result<Value, ExecutionError> {
        let fail = |reason: String| ExecutionError::ApiCallFailed {
            node_id: node_id.to_string(),
            reason,
        };

        let url = render_template(&config.url, &context.to_json()).map_err(|e| fail(e.to_string()))?;
        url::Url::parse(&url).map_err(|e| fail(format!("invalid URL '{}': {}", url, e)))?;

        let method = config.method.to_uppercase();
        let timeout_duration = config
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let mut request = HttpRequest::new(method.clone(), url.clone());
        request.headers = config.headers;
        request.timeout = Some(timeout_duration);
        if method != "GET" && method != "HEAD" {
            request.body = config.body;
        }

        info!("Node {}: {} {}", node_id, method, url);
        let response = match timeout(timeout_duration, self.http.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!("Node {}: request to {} failed: {}", node_id, url, e);
                return Err(fail(e.to_string()));
            }
            Err(_) => {
                error!("Node {}: request to {} timed out", node_id, url);
                return Err(fail(format!(
                    "request timed out after {}s",
                    timeout_duration.as_secs()
                )));
            }
        };

        if !response.is_success() {
            return Err(fail(format!(
                "{} {} returned status {}",
                method, url, response.status
            )));
        }

        let data: Value = serde_json::from_str(&response.body)
            .map_err(|e| fail(format!("invalid JSON response: {}", e)))?;

        Ok(json!({
            "status": "success",
            "data": data,
        }))
    }

    async fn execute_send_email(
        &self,
        node_id: &str,
        config: SendEmailConfig,
        context: &ExecutionContext,
    ) -> Result<Value, ExecutionError> {
        let fail = |reason: String| ExecutionError::EmailFailed {
            node_id: node_id.to_string(),
            reason,
        };

        let template_context = context.to_json();
        let to = render_or_literal(node_id, "to", &config.to, &template_context);
        let to = to.trim().to_string();
        if to.is_empty() {
            return Err(fail("missing recipient".to_string()));
        }

        let subject = render_or_literal(node_id, "subject", &config.subject, &template_context);
        let body = match &config.body {
            Some(body) => render_or_literal(node_id, "body", body, &template_context),
            None => serde_json::to_string_pretty(&template_context).map_err(|e| fail(e.to_string()))?,
        };

        info!("Node {}: sending email to {}", node_id, to);
        self.mailer
            .send(&to, &subject, &body)
            .await
            .map_err(|e| fail(e.to_string()))?;

        Ok(json!({
            "status": "success",
            "to": to,
            "subject": subject,
            "body": body,
        }))
    }
}

/// Email text is free-form, so text that merely looks like a template is sent
/// as written instead of failing the node.
fn render_or_literal(node_id: &str, field: &str, text: &str, context: &Value) -> String {
    match render_template(text, context) {
        Ok(rendered) => rendered,
        Err(e) => {
            warn!("Node {}: sending {} unrendered: {}", node_id, field, e);
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::http::{HttpResponse, MockHttpClient, TransportError};
    use crate::clients::mail::{MailError, MockMailer};

    fn executor(http: MockHttpClient, mailer: MockMailer) -> StepExecutor {
        StepExecutor::new(Arc::new(http), Arc::new(mailer))
    }

    fn api_node(config: Value) -> Node {
        Node::new("a", NodeKind::ApiCall).with_config(config)
    }

    #[tokio::test]
    async fn test_passthrough_kinds() {
        let executor = executor(MockHttpClient::new(), MockMailer::new());
        let ctx = ExecutionContext::new();

        for kind in [NodeKind::Start, NodeKind::End, NodeKind::Condition] {
            let payload = executor.execute(&Node::new("n", kind), &ctx).await.unwrap();
            assert_eq!(payload, json!({ "status": "success" }));
        }

        let note = Node::new("t", NodeKind::TextAnnotation).with_config(json!({ "text": "remember" }));
        let payload = executor.execute(&note, &ctx).await.unwrap();
        assert_eq!(payload, json!({ "status": "success", "text": "remember" }));

        let malformed = Node::new("t", NodeKind::TextAnnotation).with_config(json!({ "text": 5 }));
        let payload = executor.execute(&malformed, &ctx).await.unwrap();
        assert_eq!(payload["text"], "");
    }

    #[tokio::test]
    async fn test_api_call_defaults_to_get_and_parses_body() {
        let mut http = MockHttpClient::new();
        http.expect_request()
            .withf(|req| req.method == "GET" && req.url == "https://x/ok" && req.body.is_none())
            .times(1)
            .returning(|_| {
                Ok(HttpResponse {
                    status: 200,
                    body: r#"{"v":1}"#.to_string(),
                })
            });

        let executor = executor(http, MockMailer::new());
        let payload = executor
            .execute(&api_node(json!({ "url": "https://x/ok" })), &ExecutionContext::new())
            .await
            .unwrap();

        assert_eq!(payload, json!({ "status": "success", "data": { "v": 1 } }));
    }

    #[tokio::test]
    async fn test_api_call_renders_url_and_sends_body() {
        let mut http = MockHttpClient::new();
        http.expect_request()
            .withf(|req| {
                req.method == "POST"
                    && req.url == "https://x/items/7"
                    && req.body == Some(json!({ "n": 1 }))
                    && req.headers.get("x-token").map(String::as_str) == Some("abc")
            })
            .times(1)
            .returning(|_| {
                Ok(HttpResponse {
                    status: 201,
                    body: "[]".to_string(),
                })
            });

        let ctx = ExecutionContext::new().with_result("prev", json!({ "data": { "id": 7 } }));
        let node = api_node(json!({
            "url": "https://x/items/{{ prev.data.id }}",
            "method": "post",
            "body": { "n": 1 },
            "headers": { "x-token": "abc" }
        }));

        let payload = executor(http, MockMailer::new()).execute(&node, &ctx).await.unwrap();
        assert_eq!(payload["data"], json!([]));
    }

    #[tokio::test]
    async fn test_api_call_failures() {
        let cases: Vec<(Result<HttpResponse, TransportError>, &str)> = vec![
            (
                Ok(HttpResponse {
                    status: 500,
                    body: "{}".to_string(),
                }),
                "returned status 500",
            ),
            (
                Ok(HttpResponse {
                    status: 200,
                    body: "<html>".to_string(),
                }),
                "invalid JSON response",
            ),
            (
                Err(TransportError::Request("connection refused".to_string())),
                "connection refused",
            ),
        ];

        for (response, expected) in cases {
            let mut http = MockHttpClient::new();
            http.expect_request().times(1).return_once(move |_| response);

            let err = executor(http, MockMailer::new())
                .execute(&api_node(json!({ "url": "https://x/fail" })), &ExecutionContext::new())
                .await
                .unwrap_err();

            match err {
                ExecutionError::ApiCallFailed { node_id, reason } => {
                    assert_eq!(node_id, "a");
                    assert!(reason.contains(expected), "{} should contain {}", reason, expected);
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_api_call_config_errors_never_reach_the_network() {
        let mut http = MockHttpClient::new();
        http.expect_request().times(0);
        let executor = executor(http, MockMailer::new());

        let missing = executor
            .execute(&api_node(json!({ "method": "GET" })), &ExecutionContext::new())
            .await;
        assert!(matches!(missing, Err(ExecutionError::ApiCallFailed { .. })));

        let invalid = executor
            .execute(&api_node(json!({ "url": "not a url" })), &ExecutionContext::new())
            .await;
        assert!(matches!(invalid, Err(ExecutionError::ApiCallFailed { reason, .. }) if reason.contains("invalid URL")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_api_call_is_bounded_by_timeout() {
        struct Hang;

        #[async_trait::async_trait]
        impl HttpClient for Hang {
            async fn request(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
                std::future::pending().await
            }
        }

        let executor = StepExecutor::new(Arc::new(Hang), Arc::new(MockMailer::new()))
            .with_default_timeout(Duration::from_secs(5));
        let err = executor
            .execute(&api_node(json!({ "url": "https://x/slow" })), &ExecutionContext::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("timed out after 5s"));
    }

    #[tokio::test]
    async fn test_send_email_defaults_body_to_context() {
        let ctx = ExecutionContext::new().with_result("a", json!({ "status": "success" }));
        let expected_body = serde_json::to_string_pretty(&ctx.to_json()).unwrap();

        let mut mailer = MockMailer::new();
        let body_check = expected_body.clone();
        mailer
            .expect_send()
            .withf(move |to, subject, body| to == "u@x.com" && subject == "Report" && body == body_check)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let node = Node::new("e", NodeKind::SendEmail).with_config(json!({ "to": "u@x.com", "subject": "Report" }));
        let payload = executor(MockHttpClient::new(), mailer).execute(&node, &ctx).await.unwrap();

        assert_eq!(payload["to"], "u@x.com");
        assert_eq!(payload["subject"], "Report");
        assert_eq!(payload["body"], expected_body);
    }

    #[tokio::test]
    async fn test_send_email_renders_templates() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|_, subject, body| subject == "Build 42" && body == "status: success")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let ctx = ExecutionContext::new().with_result("a", json!({ "status": "success", "data": { "build": 42 } }));
        let node = Node::new("e", NodeKind::SendEmail).with_config(json!({
            "to": "ops@x.com",
            "subject": "Build {{ a.data.build }}",
            "body": "status: {{ a.status }}"
        }));

        let payload = executor(MockHttpClient::new(), mailer).execute(&node, &ctx).await.unwrap();
        assert_eq!(payload["body"], "status: success");
    }

    #[tokio::test]
    async fn test_send_email_keeps_unresolved_placeholders() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|to, subject, body| {
                to == "u@x.com" && subject == "Order {% if %}" && body == "Dear {{ customer }}, your order shipped"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let node = Node::new("e", NodeKind::SendEmail).with_config(json!({
            "to": "u@x.com",
            "subject": "Order {% if %}",
            "body": "Dear {{ customer }}, your order shipped"
        }));

        let payload = executor(MockHttpClient::new(), mailer)
            .execute(&node, &ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(payload["status"], "success");
        assert_eq!(payload["body"], "Dear {{ customer }}, your order shipped");
    }

    #[tokio::test]
    async fn test_send_email_failures() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .times(1)
            .returning(|_, _, _| Err(MailError::Delivery("smtp down".to_string())));
        let executor = executor(MockHttpClient::new(), mailer);

        let node = Node::new("e", NodeKind::SendEmail).with_config(json!({ "to": "u@x.com" }));
        let err = executor.execute(&node, &ExecutionContext::new()).await.unwrap_err();
        assert_eq!(
            err,
            ExecutionError::EmailFailed {
                node_id: "e".to_string(),
                reason: "delivery failed: smtp down".to_string(),
            }
        );

        let no_recipient = Node::new("e", NodeKind::SendEmail).with_config(json!({ "subject": "x" }));
        let err = executor.execute(&no_recipient, &ExecutionContext::new()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::EmailFailed { .. }));
    }

    #[tokio::test]
    async fn test_unknown_kind() {
        let executor = executor(MockHttpClient::new(), MockMailer::new());
        let node = Node::new("w", NodeKind::Other("webhook".to_string()));

        let err = executor.execute(&node, &ExecutionContext::new()).await.unwrap_err();
        assert_eq!(
            err,
            ExecutionError::UnknownNodeKind {
                node_id: "w".to_string(),
                kind: "webhook".to_string(),
            }
        );
    }
}
