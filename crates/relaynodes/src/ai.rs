use async_trait::async_trait;
use relaycore::{NodeContext, NodeError, NodeHandler, NodeMetadata, NodeOutput};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completion against an OpenAI-compatible endpoint
pub struct OpenAiNode {
    client: reqwest::Client,
}

impl OpenAiNode {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for OpenAiNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for OpenAiNode {
    fn node_type(&self) -> &str {
        "openai"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let prompt = ctx.require_str("prompt")?;
        let model = ctx.parameter_str("model").unwrap_or(DEFAULT_MODEL);
        let base_url = ctx
            .parameter_str("base_url")
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');

        let api_key = match ctx.parameter_str("api_key") {
            Some(key) => key.to_string(),
            None => std::env::var(API_KEY_ENV)
                .map_err(|_| NodeError::MissingParameter("api_key".to_string()))?,
        };

        debug!(node_id = %ctx.node_id, model, "Requesting chat completion");

        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("OpenAI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Ok(NodeOutput::failure(format!(
                "OpenAI returned {}: {}",
                status, detail
            )));
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Malformed completion: {}", e)))?;

        let reply = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(NodeOutput::success(json!({
            "response": reply,
            "model": model,
            "prompt": prompt,
        })))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Generate text with an OpenAI chat model".to_string(),
            category: "ai".to_string(),
        }
    }
}
