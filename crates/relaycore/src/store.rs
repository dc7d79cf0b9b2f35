//! Durable record of executions and their per-node audit trail
//!
//! [`RecordStore`] is the seam the engine persists through; [`MemoryStore`] is
//! the in-process implementation used by the CLI and tests.

use crate::{
    Execution, ExecutionId, ExecutionLog, ExecutionStatus, NewExecutionLog, StoreError,
    WorkflowId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Storage trait for executions and execution logs
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create an execution in RUNNING state
    async fn create_execution(
        &self,
        workflow_id: WorkflowId,
        input: Value,
    ) -> Result<Execution, StoreError>;

    async fn update_execution(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        completed_at: Option<DateTime<Utc>>,
        error: Option<String>,
    ) -> Result<Execution, StoreError>;

    /// Append a log entry; entries are never modified afterwards
    async fn append_log(&self, entry: NewExecutionLog) -> Result<ExecutionLog, StoreError>;

    async fn get_execution(&self, id: ExecutionId) -> Result<Execution, StoreError>;

    /// Executions of a workflow, newest first
    async fn list_executions(&self, workflow_id: WorkflowId)
        -> Result<Vec<Execution>, StoreError>;

    /// Log entries of an execution, oldest first
    async fn list_logs(&self, execution_id: ExecutionId) -> Result<Vec<ExecutionLog>, StoreError>;
}

#[derive(Default)]
struct MemoryState {
    executions: HashMap<ExecutionId, Execution>,
    logs: HashMap<ExecutionId, Vec<ExecutionLog>>,
}

/// In-memory record store
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_execution(
        &self,
        workflow_id: WorkflowId,
        input: Value,
    ) -> Result<Execution, StoreError> {
        let execution = Execution {
            id: Uuid::new_v4(),
            workflow_id,
            status: ExecutionStatus::Running,
            input,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        };

        let mut state = self.state.write().await;
        state.executions.insert(execution.id, execution.clone());
        state.logs.insert(execution.id, Vec::new());
        Ok(execution)
    }

    async fn update_execution(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        completed_at: Option<DateTime<Utc>>,
        error: Option<String>,
    ) -> Result<Execution, StoreError> {
        let mut state = self.state.write().await;
        let execution = state
            .executions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("execution {}", id)))?;

        execution.status = status;
        if completed_at.is_some() {
            execution.completed_at = completed_at;
        }
        if error.is_some() {
            execution.error = error;
        }
        Ok(execution.clone())
    }

    async fn append_log(&self, entry: NewExecutionLog) -> Result<ExecutionLog, StoreError> {
        let mut state = self.state.write().await;
        let logs = state
            .logs
            .get_mut(&entry.execution_id)
            .ok_or_else(|| StoreError::NotFound(format!("execution {}", entry.execution_id)))?;

        let log = ExecutionLog {
            id: Uuid::new_v4(),
            execution_id: entry.execution_id,
            node_id: entry.node_id,
            status: entry.status,
            input: entry.input,
            output: entry.output,
            error: entry.error,
            timestamp: Utc::now(),
        };
        logs.push(log.clone());
        Ok(log)
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Execution, StoreError> {
        self.state
            .read()
            .await
            .executions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("execution {}", id)))
    }

    async fn list_executions(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<Execution>, StoreError> {
        let state = self.state.read().await;
        let mut executions: Vec<Execution> = state
            .executions
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(executions)
    }

    async fn list_logs(&self, execution_id: ExecutionId) -> Result<Vec<ExecutionLog>, StoreError> {
        // Kept in append order, which is timestamp order
        self.state
            .read()
            .await
            .logs
            .get(&execution_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("execution {}", execution_id)))
    }
}
