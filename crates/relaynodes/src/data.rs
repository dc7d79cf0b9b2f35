use async_trait::async_trait;
use relaycore::{NodeContext, NodeError, NodeHandler, NodeMetadata, NodeOutput};
use serde_json::{json, Value};
use tracing::debug;

/// Database query node. No driver is linked; the query is echoed back with
/// an empty result set.
pub struct PostgresNode;

#[async_trait]
impl NodeHandler for PostgresNode {
    fn node_type(&self) -> &str {
        "postgres"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let query = ctx.require_str("query")?;
        let params = match ctx.parameter_or("params", Value::Array(vec![])) {
            Value::Null => Value::Array(vec![]),
            params @ Value::Array(_) => params,
            _ => {
                return Err(NodeError::InvalidParameter {
                    field: "params".to_string(),
                    expected: "array".to_string(),
                })
            }
        };

        debug!(node_id = %ctx.node_id, query, params = %params, "Executing query");

        Ok(NodeOutput::success(json!({
            "message": "Query executed",
            "query": query,
            "result": [],
        })))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Run a SQL query".to_string(),
            category: "data".to_string(),
        }
    }
}
