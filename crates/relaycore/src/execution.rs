use crate::workflow::{NodeId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// Lifecycle state shared by executions and individual node runs
///
/// Both follow `PENDING -> RUNNING -> {SUCCESS, ERROR}`; the last two are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Error,
}

pub type NodeStatus = ExecutionStatus;

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Error)
    }

    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self, next),
            (Pending, Running) | (Running, Success) | (Running, Error)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One run of a workflow against an input payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    pub input: Value,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Immutable record of one node state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLog {
    pub id: Uuid,
    pub execution_id: ExecutionId,
    pub node_id: NodeId,
    pub status: NodeStatus,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Log entry before the store has assigned it an id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewExecutionLog {
    pub execution_id: ExecutionId,
    pub node_id: NodeId,
    pub status: NodeStatus,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl NewExecutionLog {
    pub fn running(execution_id: ExecutionId, node_id: impl Into<NodeId>, input: Value) -> Self {
        Self {
            execution_id,
            node_id: node_id.into(),
            status: NodeStatus::Running,
            input: Some(input),
            output: None,
            error: None,
        }
    }

    /// Terminal entry mirroring a node result
    pub fn finished(execution_id: ExecutionId, input: Value, result: &NodeResult) -> Self {
        let output = match result.status {
            NodeStatus::Success => Some(result.output.clone()),
            _ => None,
        };
        Self {
            execution_id,
            node_id: result.node_id.clone(),
            status: result.status,
            input: Some(input),
            output,
            error: result.error.clone(),
        }
    }
}

/// In-memory outcome of a single node invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    pub node_id: NodeId,
    pub status: NodeStatus,
    pub output: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeResult {
    pub fn success(node_id: impl Into<NodeId>, output: Value) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Success,
            output,
            error: None,
        }
    }

    pub fn failure(node_id: impl Into<NodeId>, error: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Error,
            output: Value::Null,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == NodeStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_machine_only_moves_forward() {
        use ExecutionStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Success));
        assert!(Running.can_transition_to(Error));

        assert!(!Pending.can_transition_to(Success));
        assert!(!Success.can_transition_to(Running));
        assert!(!Error.can_transition_to(Success));
        assert!(!Running.can_transition_to(Running));
    }

    #[test]
    fn terminal_states() {
        assert!(ExecutionStatus::Success.is_terminal());
        assert!(ExecutionStatus::Error.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
    }

    #[test]
    fn status_serializes_in_upper_case() {
        let json = serde_json::to_string(&ExecutionStatus::Running).unwrap();
        assert_eq!(json, "\"RUNNING\"");
    }

    #[test]
    fn failed_result_logs_no_output() {
        let id = ExecutionId::new_v4();
        let result = NodeResult::failure("b", "boom");
        let entry = NewExecutionLog::finished(id, serde_json::json!({"x": 1}), &result);
        assert_eq!(entry.status, NodeStatus::Error);
        assert_eq!(entry.output, None);
        assert_eq!(entry.error.as_deref(), Some("boom"));
    }
}
