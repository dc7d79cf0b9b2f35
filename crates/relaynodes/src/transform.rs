use crate::now_rfc3339;
use async_trait::async_trait;
use relaycore::{NodeContext, NodeError, NodeHandler, NodeMetadata, NodeOutput};
use serde_json::Value;

/// Annotates the payload; `assign` merges static fields into it
pub struct CodeNode;

#[async_trait]
impl NodeHandler for CodeNode {
    fn node_type(&self) -> &str {
        "code"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let mut output = ctx.input_object();

        match ctx.parameters.get("assign") {
            None | Some(Value::Null) => {}
            Some(Value::Object(fields)) => {
                output.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Some(_) => {
                return Err(NodeError::InvalidParameter {
                    field: "assign".to_string(),
                    expected: "object".to_string(),
                })
            }
        }

        output.insert("processedBy".to_string(), Value::from("code-node"));
        output.insert("timestamp".to_string(), Value::from(now_rfc3339()));
        Ok(NodeOutput::success(output))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Annotate the payload and merge assigned fields".to_string(),
            category: "transform".to_string(),
        }
    }
}

/// Sets one field on the payload
pub struct SetNode;

#[async_trait]
impl NodeHandler for SetNode {
    fn node_type(&self) -> &str {
        "set"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let key = ctx.require_str("key")?.to_string();
        let value = ctx.parameter_or("value", Value::Null);

        let mut output = ctx.input_object();
        output.insert(key, value);
        Ok(NodeOutput::success(output))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Set a field on the payload".to_string(),
            category: "transform".to_string(),
        }
    }
}
