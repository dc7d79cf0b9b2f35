use async_trait::async_trait;
use relaycore::{NodeContext, NodeError, NodeHandler, NodeMetadata, NodeOutput};
use serde_json::json;
use tracing::info;

/// Outbound email. There is no transport; the message is recorded in the log.
pub struct EmailSendNode;

#[async_trait]
impl NodeHandler for EmailSendNode {
    fn node_type(&self) -> &str {
        "email-send"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let to = ctx.require_str("to")?;
        if !to.contains('@') {
            return Err(NodeError::InvalidParameter {
                field: "to".to_string(),
                expected: "email address".to_string(),
            });
        }
        let subject = ctx.parameter_str("subject").unwrap_or_default();
        let body = ctx.parameter_str("body").unwrap_or_default();

        info!(
            execution_id = %ctx.execution_id,
            node_id = %ctx.node_id,
            to,
            subject,
            body_len = body.len(),
            "Sending email"
        );

        Ok(NodeOutput::success(json!({
            "message": "Email sent successfully",
            "to": to,
            "subject": subject,
        })))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Send an email".to_string(),
            category: "communication".to_string(),
        }
    }
}
