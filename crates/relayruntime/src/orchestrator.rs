use crate::context::ExecutionContext;
use crate::graph::{CyclePolicy, WorkflowGraph};
use crate::registry::NodeRegistry;
use chrono::Utc;
use indexmap::IndexMap;
use relaycore::{
    EngineError, EventSink, Execution, ExecutionId, ExecutionLog, ExecutionStatus,
    NewExecutionLog, NodeContext, NodeError, NodeHandler, NodeId, NodeResult, NodeSpec,
    NodeStatus, RecordStore,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Per-execution limits applied by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSettings {
    /// Wrapper timeout around each handler call
    pub node_timeout: Option<Duration>,
    /// Upper bound on handler invocations in one execution
    pub max_node_invocations: usize,
    pub cycle_policy: CyclePolicy,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            node_timeout: None,
            max_node_invocations: 10_000,
            cycle_policy: CyclePolicy::Reject,
        }
    }
}

/// Terminal state of a successful execution
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub execution: Execution,
    pub results: IndexMap<NodeId, NodeResult>,
    pub logs: Vec<ExecutionLog>,
}

impl ExecutionReport {
    /// Log entries of one node, in order
    pub fn logs_for<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a ExecutionLog> {
        self.logs.iter().filter(move |l| l.node_id == node_id)
    }
}

/// One pending node invocation on the work stack
struct Frame {
    node: usize,
    input: Value,
    /// Nodes already entered on the way here
    path: Vec<usize>,
}

/// Runs a workflow graph depth-first against an input payload
///
/// Persistence and live events go through the injected collaborators after
/// every node transition.
pub struct Orchestrator {
    registry: Arc<NodeRegistry>,
    store: Arc<dyn RecordStore>,
    sink: Arc<dyn EventSink>,
    settings: ExecutionSettings,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<NodeRegistry>,
        store: Arc<dyn RecordStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            registry,
            store,
            sink,
            settings: ExecutionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ExecutionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Build a graph under this orchestrator's cycle policy
    pub fn graph(
        &self,
        workflow: impl Into<Arc<relaycore::Workflow>>,
    ) -> Result<WorkflowGraph, EngineError> {
        Ok(WorkflowGraph::new(workflow, self.settings.cycle_policy)?)
    }

    /// Execute the graph and return its terminal state
    ///
    /// On failure the execution is marked ERROR before the error is returned
    /// as [`EngineError::ExecutionFailed`], which carries the terminal record.
    pub async fn execute(
        &self,
        graph: &WorkflowGraph,
        input: Value,
    ) -> Result<ExecutionReport, EngineError> {
        let start_time = Instant::now();
        let execution = self
            .store
            .create_execution(graph.workflow_id(), input.clone())
            .await?;
        let mut ctx = ExecutionContext::new(execution.id);
        ctx.transition(ExecutionStatus::Running)?;

        info!(
            execution_id = %execution.id,
            workflow_id = %graph.workflow_id(),
            "Starting workflow execution"
        );
        self.notify(execution.id, ExecutionStatus::Running, None, None)
            .await;

        let outcome = self.traverse(graph, input, &mut ctx).await;
        let duration_ms = start_time.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                info!(execution_id = %execution.id, duration_ms, "Workflow execution succeeded");
                self.finish_success(ctx).await
            }
            Err(e) => {
                error!(execution_id = %execution.id, duration_ms, error = %e, "Workflow execution failed");
                self.finish_error(ctx, e).await
            }
        }
    }

    /// Depth-first walk from every entry node, in declared order
    async fn traverse(
        &self,
        graph: &WorkflowGraph,
        input: Value,
        ctx: &mut ExecutionContext,
    ) -> Result<(), EngineError> {
        let entries = graph.entry_indices();
        if entries.is_empty() {
            return Err(EngineError::NoStartNode);
        }

        for &entry in entries {
            let mut stack = vec![Frame {
                node: entry,
                input: input.clone(),
                path: Vec::new(),
            }];

            while let Some(frame) = stack.pop() {
                let node = graph.node_at(frame.node);
                if frame.path.contains(&frame.node) {
                    return Err(EngineError::CycleDetected {
                        node_id: node.id.clone(),
                    });
                }
                ctx.begin_invocation(self.settings.max_node_invocations)?;

                let output = self.run_node(node, frame.input, ctx).await?;

                let mut path = frame.path;
                path.push(frame.node);
                // Reversed so the first declared connection is popped first
                for &child in graph.downstream_indices(frame.node).iter().rev() {
                    stack.push(Frame {
                        node: child,
                        input: output.clone(),
                        path: path.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Run one node: RUNNING log, dispatch, terminal log
    ///
    /// Returns the node output that seeds its downstream nodes.
    async fn run_node(
        &self,
        node: &NodeSpec,
        input: Value,
        ctx: &mut ExecutionContext,
    ) -> Result<Value, EngineError> {
        let execution_id = ctx.execution_id();
        debug!(
            %execution_id,
            node_id = %node.id,
            node_type = %node.node_type,
            "Starting node"
        );
        let entry = NewExecutionLog::running(execution_id, node.id.clone(), input.clone());
        self.record(ctx, entry).await?;

        let handler = match self.registry.resolve(&node.node_type) {
            Ok(handler) => handler,
            Err(e) => {
                warn!(node_id = %node.id, error = %e, "Cannot dispatch node");
                let result = NodeResult::failure(node.id.clone(), e.to_string());
                self.complete_node(ctx, input, result).await?;
                return Err(e);
            }
        };

        let started = Instant::now();
        let result = self
            .invoke(handler.as_ref(), node, execution_id, input.clone())
            .await;
        debug!(
            node_id = %node.id,
            status = %result.status,
            duration_ms = started.elapsed().as_millis() as u64,
            "Node finished"
        );

        let failure = match result.status {
            NodeStatus::Error => Some(EngineError::NodeExecution {
                node_id: node.id.clone(),
                message: result
                    .error
                    .clone()
                    .unwrap_or_else(|| "node reported an error".to_string()),
            }),
            _ => None,
        };
        let output = result.output.clone();
        self.complete_node(ctx, input, result).await?;

        match failure {
            Some(e) => Err(e),
            None => Ok(output),
        }
    }

    /// Call the handler, folding raised errors and timeouts into a result
    async fn invoke(
        &self,
        handler: &dyn NodeHandler,
        node: &NodeSpec,
        execution_id: ExecutionId,
        input: Value,
    ) -> NodeResult {
        let node_ctx = NodeContext::new(
            execution_id,
            node.id.clone(),
            node.node_type.clone(),
            node.parameters.clone(),
            input,
        );

        let outcome = match self.settings.node_timeout {
            Some(limit) => match tokio::time::timeout(limit, handler.execute(node_ctx)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(NodeError::Timeout {
                    millis: limit.as_millis() as u64,
                }),
            },
            None => handler.execute(node_ctx).await,
        };

        match outcome {
            Ok(out) => NodeResult {
                node_id: node.id.clone(),
                status: out.status(),
                output: out.output,
                error: out.error,
            },
            Err(e) => {
                warn!(node_id = %node.id, error = %e, "Node handler raised an error");
                NodeResult::failure(node.id.clone(), e.to_string())
            }
        }
    }

    async fn complete_node(
        &self,
        ctx: &mut ExecutionContext,
        input: Value,
        result: NodeResult,
    ) -> Result<(), EngineError> {
        let entry = NewExecutionLog::finished(ctx.execution_id(), input, &result);
        ctx.record_result(result);
        self.record(ctx, entry).await
    }

    /// Persist a log entry, then mirror it to the sink
    async fn record(
        &self,
        ctx: &mut ExecutionContext,
        entry: NewExecutionLog,
    ) -> Result<(), EngineError> {
        let log = self.store.append_log(entry).await.map_err(|e| {
            error!(execution_id = %ctx.execution_id(), error = %e, "Failed to persist node log");
            EngineError::Persistence(e)
        })?;

        if let Err(e) = self.sink.on_node_log(&log).await {
            warn!(execution_id = %ctx.execution_id(), error = %e, "Dropped node log event");
        }
        ctx.push_log(log);
        Ok(())
    }

    async fn notify(
        &self,
        execution_id: ExecutionId,
        status: ExecutionStatus,
        output: Option<Value>,
        error: Option<String>,
    ) {
        if let Err(e) = self
            .sink
            .on_execution_update(execution_id, status, output, error)
            .await
        {
            warn!(%execution_id, %status, error = %e, "Dropped execution update event");
        }
    }

    async fn finish_success(
        &self,
        mut ctx: ExecutionContext,
    ) -> Result<ExecutionReport, EngineError> {
        let execution_id = ctx.execution_id();

        let execution = match self
            .store
            .update_execution(execution_id, ExecutionStatus::Success, Some(Utc::now()), None)
            .await
        {
            Ok(execution) => execution,
            Err(e) => {
                error!(%execution_id, error = %e, "Failed to record execution success");
                // The record is still RUNNING; try to close it as ERROR instead
                return self.finish_error(ctx, EngineError::Persistence(e)).await;
            }
        };
        ctx.transition(ExecutionStatus::Success)?;

        let output = serde_json::to_value(ctx.results()).unwrap_or_default();
        self.notify(execution_id, ExecutionStatus::Success, Some(output), None)
            .await;

        let (results, logs) = ctx.into_parts();
        Ok(ExecutionReport {
            execution,
            results,
            logs,
        })
    }

    async fn finish_error(
        &self,
        mut ctx: ExecutionContext,
        failure: EngineError,
    ) -> Result<ExecutionReport, EngineError> {
        ctx.transition(ExecutionStatus::Error)?;
        let execution_id = ctx.execution_id();
        let message = failure.to_string();

        let stored = self
            .store
            .update_execution(
                execution_id,
                ExecutionStatus::Error,
                Some(Utc::now()),
                Some(message.clone()),
            )
            .await;

        self.notify(execution_id, ExecutionStatus::Error, None, Some(message))
            .await;

        match stored {
            Ok(execution) => Err(EngineError::ExecutionFailed {
                execution: Box::new(execution),
                source: Box::new(failure),
            }),
            Err(store_error) => {
                error!(%execution_id, error = %store_error, cause = %failure, "Failed to record execution failure");
                Err(EngineError::TerminalStatusWrite {
                    store_error,
                    source: Box::new(failure),
                })
            }
        }
    }
}
