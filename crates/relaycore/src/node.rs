use crate::{ExecutionId, NodeError, NodeId, NodeStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Executable logic bound to a node type tag
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Type tag this handler is registered under (e.g. "http-request", "set")
    fn node_type(&self) -> &str;

    /// Run the node against its parameters and the upstream payload
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError>;

    /// Optional: description and category shown in node listings
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::default()
    }
}

/// Everything a handler sees for one invocation
#[derive(Debug, Clone)]
pub struct NodeContext {
    pub execution_id: ExecutionId,
    pub node_id: NodeId,
    pub node_type: String,

    /// Static parameters declared on the node
    pub parameters: Map<String, Value>,

    /// Output of the upstream node that triggered this invocation
    pub input: Value,
}

impl NodeContext {
    pub fn new(
        execution_id: ExecutionId,
        node_id: impl Into<NodeId>,
        node_type: impl Into<String>,
        parameters: Map<String, Value>,
        input: Value,
    ) -> Self {
        Self {
            execution_id,
            node_id: node_id.into(),
            node_type: node_type.into(),
            parameters,
            input,
        }
    }

    /// Get required parameter or return error
    pub fn require_parameter(&self, name: &str) -> Result<&Value, NodeError> {
        self.parameters
            .get(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| NodeError::MissingParameter(name.to_string()))
    }

    /// Get required string parameter
    pub fn require_str(&self, name: &str) -> Result<&str, NodeError> {
        self.require_parameter(name)?
            .as_str()
            .ok_or_else(|| NodeError::InvalidParameter {
                field: name.to_string(),
                expected: "string".to_string(),
            })
    }

    pub fn parameter_str(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(Value::as_str)
    }

    /// Get parameter with default
    pub fn parameter_or(&self, name: &str, default: Value) -> Value {
        self.parameters.get(name).cloned().unwrap_or(default)
    }

    /// The input as a JSON object; non-object payloads yield an empty one
    pub fn input_object(&self) -> Map<String, Value> {
        match &self.input {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        }
    }
}

/// What a handler hands back: an output payload or an error message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    pub output: Value,
    pub error: Option<String>,
}

impl NodeOutput {
    pub fn success(output: impl Into<Value>) -> Self {
        Self {
            output: output.into(),
            error: None,
        }
    }

    /// A handled failure; the node is recorded as ERROR
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            output: Value::Null,
            error: Some(error.into()),
        }
    }

    pub fn status(&self) -> NodeStatus {
        if self.error.is_some() {
            NodeStatus::Error
        } else {
            NodeStatus::Success
        }
    }
}

/// Metadata about a node type
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMetadata {
    pub description: String,
    pub category: String,
}

impl Default for NodeMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
        }
    }
}
