// crates/relaynodes/tests/nodes_test.rs

use relaycore::{ExecutionStatus, NodeContext, NodeError, NodeHandler, NodeSpec, Workflow};
use relaynodes::{
    register_all, CodeNode, EmailSendNode, HttpRequestNode, IfNode, OpenAiNode, PostgresNode,
    ScheduleTriggerNode, SetNode, WebhookTriggerNode,
};
use relayruntime::{FlowRuntime, NodeRegistry, RuntimeConfig};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use uuid::Uuid;

fn ctx(node_type: &str, parameters: Value, input: Value) -> NodeContext {
    let parameters: Map<String, Value> = match parameters {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    NodeContext::new(Uuid::new_v4(), "node", node_type, parameters, input)
}

fn local_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Serves exactly one HTTP request and hands back the raw request text
async fn one_shot_server(status: &str, content_type: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {}\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&buf).to_string()
    });

    (format!("http://{}", addr), handle)
}

#[tokio::test]
async fn triggers_forward_their_payload() {
    let out = WebhookTriggerNode
        .execute(ctx("webhook-trigger", json!({}), json!({ "id": 7 })))
        .await
        .unwrap();
    assert_eq!(out.status(), ExecutionStatus::Success);
    assert_eq!(out.output["message"], "Webhook triggered");
    assert_eq!(out.output["payload"], json!({ "id": 7 }));
    assert!(out.output["timestamp"].is_string());

    let out = ScheduleTriggerNode
        .execute(ctx("schedule-trigger", json!({ "cron": "*/5 * * * *" }), json!({})))
        .await
        .unwrap();
    assert_eq!(out.output["message"], "Schedule triggered");
    assert_eq!(out.output["cron"], "*/5 * * * *");
}

#[tokio::test]
async fn set_overwrites_one_field() {
    let out = SetNode
        .execute(ctx("set", json!({ "key": "b", "value": 2 }), json!({ "a": 1, "b": 0 })))
        .await
        .unwrap();
    assert_eq!(out.output, json!({ "a": 1, "b": 2 }));

    let out = SetNode
        .execute(ctx("set", json!({ "key": "flag", "value": true }), json!("scalar")))
        .await
        .unwrap();
    assert_eq!(out.output, json!({ "flag": true }));

    let err = SetNode
        .execute(ctx("set", json!({ "value": 1 }), json!({})))
        .await
        .unwrap_err();
    assert_eq!(err, NodeError::MissingParameter("key".to_string()));
}

#[tokio::test]
async fn code_node_annotates_and_assigns() {
    let out = CodeNode
        .execute(ctx("code", json!({ "assign": { "tier": "gold" } }), json!({ "id": 1 })))
        .await
        .unwrap();
    assert_eq!(out.output["id"], 1);
    assert_eq!(out.output["tier"], "gold");
    assert_eq!(out.output["processedBy"], "code-node");

    let err = CodeNode
        .execute(ctx("code", json!({ "assign": [1] }), json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::InvalidParameter { ref field, .. } if field == "assign"));
}

#[tokio::test]
async fn if_node_reports_the_branch() {
    let out = IfNode
        .execute(ctx("if", json!({ "condition": "{amount} > 100" }), json!({ "amount": 150 })))
        .await
        .unwrap();
    assert_eq!(out.output["conditionResult"], true);
    assert_eq!(out.output["nextPath"], "true");
    assert_eq!(out.output["amount"], 150);

    let out = IfNode
        .execute(ctx("if", json!({ "condition": "{amount} >" }), json!({ "amount": 150 })))
        .await
        .unwrap();
    assert_eq!(out.output["conditionResult"], false);
    assert_eq!(out.output["nextPath"], "false");

    let err = IfNode.execute(ctx("if", json!({}), json!({}))).await.unwrap_err();
    assert_eq!(err, NodeError::MissingParameter("condition".to_string()));
}

#[tokio::test]
async fn deeply_nested_condition_takes_the_false_branch() {
    let condition = format!("{}{{amount}} > 1{}", "(".repeat(20_000), ")".repeat(20_000));
    let out = IfNode
        .execute(ctx("if", json!({ "condition": condition }), json!({ "amount": 5 })))
        .await
        .unwrap();
    assert_eq!(out.status(), ExecutionStatus::Success);
    assert_eq!(out.output["conditionResult"], false);
    assert_eq!(out.output["nextPath"], "false");
}

#[tokio::test]
async fn email_requires_an_address() {
    let out = EmailSendNode
        .execute(ctx("email-send", json!({ "to": "ops@example.com", "subject": "hi" }), json!({})))
        .await
        .unwrap();
    assert_eq!(
        out.output,
        json!({ "message": "Email sent successfully", "to": "ops@example.com", "subject": "hi" })
    );

    let err = EmailSendNode
        .execute(ctx("email-send", json!({ "to": "nobody" }), json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::InvalidParameter { ref field, .. } if field == "to"));
}

#[tokio::test]
async fn postgres_echoes_the_query() {
    let out = PostgresNode
        .execute(ctx("postgres", json!({ "query": "SELECT 1", "params": [1] }), json!({})))
        .await
        .unwrap();
    assert_eq!(
        out.output,
        json!({ "message": "Query executed", "query": "SELECT 1", "result": [] })
    );

    let err = PostgresNode
        .execute(ctx("postgres", json!({}), json!({})))
        .await
        .unwrap_err();
    assert_eq!(err, NodeError::MissingParameter("query".to_string()));
}

#[tokio::test]
async fn http_posts_the_input_and_parses_json() {
    let (url, server) = one_shot_server("201 Created", "application/json", r#"{"ok":true}"#).await;

    let node = HttpRequestNode::with_client(local_client());
    let out = node
        .execute(ctx(
            "http-request",
            json!({ "url": format!("{}/orders", url), "method": "post", "headers": { "x-trace": "abc" } }),
            json!({ "order": 42 }),
        ))
        .await
        .unwrap();

    assert_eq!(out.output["statusCode"], 201);
    assert_eq!(out.output["body"], json!({ "ok": true }));
    assert_eq!(out.output["headers"]["content-type"], "application/json");

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /orders HTTP/1.1"));
    assert!(request.to_lowercase().contains("x-trace: abc"));
    assert!(request.ends_with(r#"{"order":42}"#));
}

#[tokio::test]
async fn http_error_status_is_still_output() {
    let (url, server) = one_shot_server("404 Not Found", "text/plain", "missing").await;

    let out = HttpRequestNode::with_client(local_client())
        .execute(ctx("http-request", json!({ "url": url }), json!({})))
        .await
        .unwrap();
    assert_eq!(out.status(), ExecutionStatus::Success);
    assert_eq!(out.output["statusCode"], 404);
    assert_eq!(out.output["body"], "missing");

    assert!(server.await.unwrap().starts_with("GET / HTTP/1.1"));
}

#[tokio::test]
async fn http_transport_failure_is_an_error() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = HttpRequestNode::with_client(local_client())
        .execute(ctx("http-request", json!({ "url": format!("http://{}", addr) }), json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::ExecutionFailed(_)));

    let err = HttpRequestNode::with_client(local_client())
        .execute(ctx("http-request", json!({ "url": "http://localhost", "method": "TRACE" }), json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::InvalidParameter { ref field, .. } if field == "method"));
}

#[tokio::test]
async fn openai_calls_chat_completions() {
    let (url, server) = one_shot_server(
        "200 OK",
        "application/json",
        r#"{"choices":[{"message":{"role":"assistant","content":"Hello there"}}]}"#,
    )
    .await;

    let out = OpenAiNode::with_client(local_client())
        .execute(ctx(
            "openai",
            json!({ "prompt": "Say hello", "api_key": "sk-test", "base_url": url }),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(
        out.output,
        json!({ "response": "Hello there", "model": "gpt-4o-mini", "prompt": "Say hello" })
    );

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /chat/completions HTTP/1.1"));
    assert!(request.to_lowercase().contains("authorization: bearer sk-test"));
    assert!(request.contains(r#""content":"Say hello""#));
}

#[tokio::test]
async fn catalog_runs_end_to_end() {
    let mut registry = NodeRegistry::new();
    register_all(&mut registry);
    for tag in [
        "webhook-trigger",
        "schedule-trigger",
        "http-request",
        "code",
        "set",
        "if",
        "email-send",
        "postgres",
        "openai",
    ] {
        assert!(registry.contains(tag), "{} not registered", tag);
    }

    let mut wf = Workflow::new("catalog");
    wf.add_node(NodeSpec::new("hook", "webhook-trigger"));
    wf.add_node(NodeSpec::new("tag", "set").with_parameter("key", "seen").with_parameter("value", true));
    wf.add_node(NodeSpec::new("check", "if").with_parameter("condition", "{seen} && {payload.total} >= 10"));
    wf.add_node(NodeSpec::new("notify", "email-send").with_parameter("to", "team@example.com"));
    wf.connect("hook", "tag");
    wf.connect("tag", "check");
    wf.connect("check", "notify");

    let runtime = FlowRuntime::with_registry(Arc::new(registry), RuntimeConfig::default());
    let report = runtime.execute(wf, json!({ "total": 12 })).await.unwrap();

    assert_eq!(report.execution.status, ExecutionStatus::Success);
    assert_eq!(
        report.results.keys().cloned().collect::<Vec<_>>(),
        vec!["hook", "tag", "check", "notify"]
    );
    assert_eq!(report.results["check"].output["conditionResult"], true);
    assert_eq!(report.results["notify"].output["to"], "team@example.com");
    assert_eq!(report.logs.len(), 8);
}
