use crate::now_rfc3339;
use async_trait::async_trait;
use relaycore::{NodeContext, NodeError, NodeHandler, NodeMetadata, NodeOutput};
use serde_json::json;

/// Entry point fired by an inbound webhook; forwards the trigger payload
pub struct WebhookTriggerNode;

#[async_trait]
impl NodeHandler for WebhookTriggerNode {
    fn node_type(&self) -> &str {
        "webhook-trigger"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        Ok(NodeOutput::success(json!({
            "message": "Webhook triggered",
            "timestamp": now_rfc3339(),
            "payload": ctx.input,
        })))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Start a workflow from an inbound webhook".to_string(),
            category: "trigger".to_string(),
        }
    }
}

/// Entry point fired on a schedule
pub struct ScheduleTriggerNode;

#[async_trait]
impl NodeHandler for ScheduleTriggerNode {
    fn node_type(&self) -> &str {
        "schedule-trigger"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let mut output = json!({
            "message": "Schedule triggered",
            "timestamp": now_rfc3339(),
            "payload": ctx.input,
        });
        if let Some(cron) = ctx.parameters.get("cron").filter(|v| !v.is_null()) {
            output["cron"] = cron.clone();
        }
        Ok(NodeOutput::success(output))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Start a workflow on a cron schedule".to_string(),
            category: "trigger".to_string(),
        }
    }
}
