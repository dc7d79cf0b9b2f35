use crate::{ExecutionId, ExecutionLog, ExecutionStatus, NodeId, NodeStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Live progress messages published while a workflow runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExecutionEvent {
    #[serde(rename_all = "camelCase")]
    ExecutionUpdate {
        execution_id: ExecutionId,
        status: ExecutionStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    NodeLog {
        execution_id: ExecutionId,
        node_id: NodeId,
        status: NodeStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    pub fn execution_update(
        execution_id: ExecutionId,
        status: ExecutionStatus,
        output: Option<Value>,
        error: Option<String>,
    ) -> Self {
        ExecutionEvent::ExecutionUpdate {
            execution_id,
            status,
            output,
            error,
            timestamp: Utc::now(),
        }
    }

    /// Mirror a persisted log entry onto the live channel
    pub fn node_log(entry: &ExecutionLog) -> Self {
        ExecutionEvent::NodeLog {
            execution_id: entry.execution_id,
            node_id: entry.node_id.clone(),
            status: entry.status,
            input: entry.input.clone(),
            output: entry.output.clone(),
            error: entry.error.clone(),
            timestamp: entry.timestamp,
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        match self {
            ExecutionEvent::ExecutionUpdate { execution_id, .. }
            | ExecutionEvent::NodeLog { execution_id, .. } => *execution_id,
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        match self {
            ExecutionEvent::ExecutionUpdate { status, .. }
            | ExecutionEvent::NodeLog { status, .. } => *status,
        }
    }
}

/// Global event bus
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    /// Publish to current subscribers; returns how many received it
    pub fn emit(&self, event: ExecutionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
