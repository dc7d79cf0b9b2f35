use crate::expr;
use async_trait::async_trait;
use relaycore::{NodeContext, NodeError, NodeHandler, NodeMetadata, NodeOutput};
use serde_json::Value;
use tracing::warn;

/// Evaluates a condition against the payload and tags the branch taken
pub struct IfNode;

#[async_trait]
impl NodeHandler for IfNode {
    fn node_type(&self) -> &str {
        "if"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let condition = ctx.require_str("condition")?;

        let result = match expr::evaluate_condition(condition, &ctx.input) {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    node_id = %ctx.node_id,
                    condition,
                    error = %e,
                    "Condition could not be evaluated, taking the false branch"
                );
                false
            }
        };

        let mut output = ctx.input_object();
        output.insert("conditionResult".to_string(), Value::Bool(result));
        output.insert(
            "nextPath".to_string(),
            Value::from(if result { "true" } else { "false" }),
        );
        Ok(NodeOutput::success(output))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Evaluate a condition against the payload".to_string(),
            category: "flow".to_string(),
        }
    }
}
