use indexmap::IndexMap;
use relaycore::{EngineError, ExecutionId, ExecutionLog, ExecutionStatus, NodeId, NodeResult};

/// Mutable state of a single in-flight execution
///
/// Owned by exactly one traversal, so nothing here is synchronized.
#[derive(Debug)]
pub struct ExecutionContext {
    execution_id: ExecutionId,
    status: ExecutionStatus,
    results: IndexMap<NodeId, NodeResult>,
    logs: Vec<ExecutionLog>,
    invocations: usize,
}

impl ExecutionContext {
    pub fn new(execution_id: ExecutionId) -> Self {
        Self {
            execution_id,
            status: ExecutionStatus::Pending,
            results: IndexMap::new(),
            logs: Vec::new(),
            invocations: 0,
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn transition(&mut self, next: ExecutionStatus) -> Result<(), EngineError> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Count one handler invocation against `limit`
    pub fn begin_invocation(&mut self, limit: usize) -> Result<(), EngineError> {
        if self.invocations >= limit {
            return Err(EngineError::InvocationLimit { limit });
        }
        self.invocations += 1;
        Ok(())
    }

    pub fn invocations(&self) -> usize {
        self.invocations
    }

    /// Store a node result; a replayed node keeps its first position
    pub fn record_result(&mut self, result: NodeResult) {
        self.results.insert(result.node_id.clone(), result);
    }

    pub fn result(&self, node_id: &str) -> Option<&NodeResult> {
        self.results.get(node_id)
    }

    pub fn results(&self) -> &IndexMap<NodeId, NodeResult> {
        &self.results
    }

    pub fn push_log(&mut self, log: ExecutionLog) {
        self.logs.push(log);
    }

    pub fn logs(&self) -> &[ExecutionLog] {
        &self.logs
    }

    pub fn into_parts(self) -> (IndexMap<NodeId, NodeResult>, Vec<ExecutionLog>) {
        (self.results, self.logs)
    }
}
