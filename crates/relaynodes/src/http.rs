use async_trait::async_trait;
use relaycore::{NodeContext, NodeError, NodeHandler, NodeMetadata, NodeOutput};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

/// HTTP request node
pub struct HttpRequestNode {
    client: reqwest::Client,
}

impl HttpRequestNode {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpRequestNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for HttpRequestNode {
    fn node_type(&self) -> &str {
        "http-request"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let url = ctx.require_str("url")?;
        let method = ctx.parameter_str("method").unwrap_or("GET").to_uppercase();

        debug!(node_id = %ctx.node_id, "{} {}", method, url);

        let (request, sends_body) = match method.as_str() {
            "GET" => (self.client.get(url), false),
            "DELETE" => (self.client.delete(url), false),
            "POST" => (self.client.post(url), true),
            "PUT" => (self.client.put(url), true),
            "PATCH" => (self.client.patch(url), true),
            _ => {
                return Err(NodeError::InvalidParameter {
                    field: "method".to_string(),
                    expected: "one of GET, POST, PUT, PATCH, DELETE".to_string(),
                })
            }
        };

        let mut request = match ctx.parameters.get("headers") {
            None | Some(Value::Null) => request,
            Some(Value::Object(headers)) => {
                headers.iter().fold(request, |req, (key, value)| match value {
                    Value::String(s) => req.header(key, s),
                    other => req.header(key, other.to_string()),
                })
            }
            Some(_) => {
                return Err(NodeError::InvalidParameter {
                    field: "headers".to_string(),
                    expected: "object".to_string(),
                })
            }
        };

        if sends_body {
            // Without an explicit body the upstream payload is sent
            let body = match ctx.parameters.get("body") {
                Some(v) if !v.is_null() => v,
                _ => &ctx.input,
            };
            request = match body {
                Value::String(text) => request.body(text.clone()),
                other => request.json(other),
            };
        }

        if let Some(ms) = ctx.parameters.get("timeout_ms").and_then(Value::as_u64) {
            request = request.timeout(Duration::from_millis(ms));
        }

        let response = request
            .send()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.to_string(),
                    Value::String(v.to_str().unwrap_or_default().to_string()),
                )
            })
            .collect();

        let text = response
            .text()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Failed to read response: {}", e)))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        debug!(node_id = %ctx.node_id, status, "Response received");

        Ok(NodeOutput::success(json!({
            "statusCode": status,
            "headers": headers,
            "body": body,
        })))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Make HTTP requests".to_string(),
            category: "http".to_string(),
        }
    }
}
