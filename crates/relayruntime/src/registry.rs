use async_trait::async_trait;
use relaycore::{EngineError, NodeContext, NodeError, NodeHandler, NodeMetadata, NodeOutput};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Registry of available node types
///
/// Populated at startup, then shared read-only across executions.
pub struct NodeRegistry {
    handlers: HashMap<String, Arc<dyn NodeHandler>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under its own type tag
    pub fn register(&mut self, handler: Arc<dyn NodeHandler>) {
        let node_type = handler.node_type().to_string();
        self.register_as(node_type, handler);
    }

    /// Register a handler under an explicit type tag, replacing any previous one
    pub fn register_as(&mut self, node_type: impl Into<String>, handler: Arc<dyn NodeHandler>) {
        let node_type = node_type.into();
        tracing::info!("Registering node type: {}", node_type);
        if self.handlers.insert(node_type.clone(), handler).is_some() {
            tracing::debug!("Replaced existing handler for {}", node_type);
        }
    }

    /// Look up the handler for a type tag
    pub fn resolve(&self, node_type: &str) -> Result<Arc<dyn NodeHandler>, EngineError> {
        self.handlers
            .get(node_type)
            .cloned()
            .ok_or_else(|| EngineError::UnknownNodeType(node_type.to_string()))
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.handlers.contains_key(node_type)
    }

    /// Get all registered node types, sorted
    pub fn list_node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Get metadata for a node type
    pub fn get_metadata(&self, node_type: &str) -> Option<NodeMetadata> {
        self.handlers.get(node_type).map(|h| h.metadata())
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler backed by an async closure
pub struct FnHandler<F> {
    node_type: String,
    f: F,
}

/// Wrap an async closure as a [`NodeHandler`]
pub fn handler_fn<F, Fut>(node_type: impl Into<String>, f: F) -> Arc<FnHandler<F>>
where
    F: Fn(NodeContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<NodeOutput, NodeError>> + Send + 'static,
{
    Arc::new(FnHandler {
        node_type: node_type.into(),
        f,
    })
}

#[async_trait]
impl<F, Fut> NodeHandler for FnHandler<F>
where
    F: Fn(NodeContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<NodeOutput, NodeError>> + Send + 'static,
{
    fn node_type(&self) -> &str {
        &self.node_type
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        (self.f)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaycore::ExecutionId;
    use serde_json::{json, Map};

    #[tokio::test]
    async fn resolves_registered_handler() {
        let mut registry = NodeRegistry::new();
        registry.register(handler_fn("echo", |ctx: NodeContext| async move {
            Ok(NodeOutput::success(ctx.input))
        }));

        let handler = registry.resolve("echo").unwrap();
        let ctx = NodeContext::new(ExecutionId::new_v4(), "n", "echo", Map::new(), json!({"v": 1}));
        let out = handler.execute(ctx).await.unwrap();
        assert_eq!(out.output, json!({"v": 1}));
    }

    #[test]
    fn unknown_tag_fails_closed() {
        let registry = NodeRegistry::new();
        match registry.resolve("mystery") {
            Err(EngineError::UnknownNodeType(tag)) => assert_eq!(tag, "mystery"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("resolved an unregistered tag"),
        }
    }

    #[test]
    fn register_as_overrides_and_lists_sorted() {
        let mut registry = NodeRegistry::new();
        registry.register(handler_fn("set", |_| async { Ok(NodeOutput::success(json!(1))) }));
        registry.register(handler_fn("code", |_| async { Ok(NodeOutput::success(json!(2))) }));
        registry.register_as(
            "set",
            handler_fn("set", |_| async { Ok(NodeOutput::success(json!(3))) }),
        );

        assert_eq!(registry.list_node_types(), vec!["code", "set"]);
        assert!(registry.contains("set"));
        assert_eq!(registry.get_metadata("code").unwrap().category, "general");
    }
}
