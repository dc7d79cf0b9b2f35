use crate::config::RuntimeConfig;
use crate::graph::WorkflowGraph;
use crate::orchestrator::{ExecutionReport, Orchestrator};
use crate::pool::{ExecutionHandle, ExecutionPool};
use crate::registry::NodeRegistry;
use relaycore::{
    Connection, EngineError, EventBus, EventSink, Execution, ExecutionEvent, ExecutionId,
    ExecutionLog, FanoutSink, MemoryStore, NodeSpec, RecordStore, Workflow, WorkflowError,
    WorkflowId, WorkflowStatus,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Main runtime for executing workflows
///
/// Owns the workflow catalog and wires the shared registry, record store and
/// event sinks into an orchestrator and its worker pool. Must be built inside
/// a tokio runtime.
pub struct FlowRuntime {
    registry: Arc<NodeRegistry>,
    store: Arc<dyn RecordStore>,
    event_bus: Arc<EventBus>,
    orchestrator: Arc<Orchestrator>,
    pool: ExecutionPool,
    workflows: Arc<RwLock<HashMap<WorkflowId, Arc<Workflow>>>>,
    config: RuntimeConfig,
}

/// Whole-field replacement of a stored workflow
#[derive(Debug, Clone, Default)]
pub struct WorkflowUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub nodes: Option<Vec<NodeSpec>>,
    pub connections: Option<Vec<Connection>>,
    pub status: Option<WorkflowStatus>,
}

pub struct RuntimeBuilder {
    registry: Arc<NodeRegistry>,
    store: Option<Arc<dyn RecordStore>>,
    sinks: Vec<Arc<dyn EventSink>>,
    config: RuntimeConfig,
}

impl RuntimeBuilder {
    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Add a sink next to the built-in event bus
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> FlowRuntime {
        let config = self.config;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn RecordStore>);
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        let mut fanout = FanoutSink::new(vec![event_bus.clone() as Arc<dyn EventSink>]);
        for sink in self.sinks {
            fanout.push(sink);
        }

        let orchestrator = Arc::new(
            Orchestrator::new(self.registry.clone(), store.clone(), Arc::new(fanout))
                .with_settings(config.execution_settings()),
        );
        let pool = ExecutionPool::spawn(orchestrator.clone(), config.workers, config.queue_capacity);

        FlowRuntime {
            registry: self.registry,
            store,
            event_bus,
            orchestrator,
            pool,
            workflows: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }
}

impl FlowRuntime {
    pub fn builder(registry: Arc<NodeRegistry>) -> RuntimeBuilder {
        RuntimeBuilder {
            registry,
            store: None,
            sinks: Vec::new(),
            config: RuntimeConfig::default(),
        }
    }

    /// Create a new runtime with a pre-configured registry and an in-memory store
    pub fn with_registry(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        Self::builder(registry).config(config).build()
    }

    /// Get access to the node registry
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Register a workflow after structural validation
    pub async fn register_workflow(&self, workflow: Workflow) -> Result<WorkflowId, EngineError> {
        self.orchestrator.graph(workflow.clone())?;
        let id = workflow.id;
        tracing::info!(workflow_id = %id, name = %workflow.name, "Registered workflow");
        self.workflows.write().await.insert(id, Arc::new(workflow));
        Ok(id)
    }

    /// Replace fields of a stored workflow as a whole and bump its version
    pub async fn update_workflow(
        &self,
        id: WorkflowId,
        update: WorkflowUpdate,
    ) -> Result<Arc<Workflow>, EngineError> {
        let mut workflows = self.workflows.write().await;
        let current = workflows
            .get(&id)
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))?;

        let mut next = Workflow::clone(current);
        if let Some(name) = update.name {
            next.name = name;
        }
        if let Some(description) = update.description {
            next.description = Some(description);
        }
        if let Some(nodes) = update.nodes {
            next.nodes = nodes;
        }
        if let Some(connections) = update.connections {
            next.connections = connections;
        }
        if let Some(status) = update.status {
            next.status = status;
        }
        next.version += 1;

        self.orchestrator.graph(next.clone())?;
        let next = Arc::new(next);
        workflows.insert(id, next.clone());
        tracing::info!(workflow_id = %id, version = next.version, "Updated workflow");
        Ok(next)
    }

    pub async fn get_workflow(&self, id: WorkflowId) -> Option<Arc<Workflow>> {
        self.workflows.read().await.get(&id).cloned()
    }

    pub async fn remove_workflow(&self, id: WorkflowId) -> Option<Arc<Workflow>> {
        self.workflows.write().await.remove(&id)
    }

    pub async fn list_workflows(&self) -> Vec<Arc<Workflow>> {
        self.workflows.read().await.values().cloned().collect()
    }

    /// Execute a workflow directly (without registration or status checks)
    pub async fn execute(
        &self,
        workflow: impl Into<Arc<Workflow>>,
        input: Value,
    ) -> Result<ExecutionReport, EngineError> {
        let graph = self.orchestrator.graph(workflow)?;
        self.orchestrator.execute(&graph, input).await
    }

    /// Execute a registered, active workflow by ID
    pub async fn execute_workflow(
        &self,
        workflow_id: WorkflowId,
        input: Value,
    ) -> Result<ExecutionReport, EngineError> {
        let graph = self.active_graph(workflow_id).await?;
        self.orchestrator.execute(&graph, input).await
    }

    /// Queue a registered, active workflow on the worker pool
    pub async fn submit(
        &self,
        workflow_id: WorkflowId,
        input: Value,
    ) -> Result<ExecutionHandle, EngineError> {
        let graph = self.active_graph(workflow_id).await?;
        self.pool.submit(Arc::new(graph), input).await
    }

    async fn active_graph(&self, workflow_id: WorkflowId) -> Result<WorkflowGraph, EngineError> {
        let workflow = self
            .get_workflow(workflow_id)
            .await
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()))?;
        if workflow.status != WorkflowStatus::Active {
            return Err(WorkflowError::NotActive(workflow_id.to_string()).into());
        }
        self.orchestrator.graph(workflow)
    }

    pub async fn get_execution(&self, id: ExecutionId) -> Result<Execution, EngineError> {
        Ok(self.store.get_execution(id).await?)
    }

    /// Executions of a workflow, newest first
    pub async fn list_executions(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<Execution>, EngineError> {
        Ok(self.store.list_executions(workflow_id).await?)
    }

    /// Per-node audit trail of an execution, oldest first
    pub async fn execution_logs(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Vec<ExecutionLog>, EngineError> {
        Ok(self.store.list_logs(execution_id).await?)
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Get the event bus for direct access
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Drain queued executions and stop the worker pool
    pub async fn shutdown(self) {
        self.pool.shutdown().await;
    }
}
