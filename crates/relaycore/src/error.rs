use crate::execution::{Execution, ExecutionStatus};
use thiserror::Error;

/// Failures surfaced by the engine to its callers
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No starting nodes found in workflow")]
    NoStartNode,

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Node {node_id} failed: {message}")]
    NodeExecution { node_id: String, message: String },

    #[error("Cycle detected at node {node_id}")]
    CycleDetected { node_id: String },

    #[error("Execution exceeded the limit of {limit} node invocations")]
    InvocationLimit { limit: usize },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Event sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Execution pool error: {0}")]
    Pool(String),

    /// Raised after the terminal ERROR status has been written; carries that record.
    #[error("{source}")]
    ExecutionFailed {
        execution: Box<Execution>,
        #[source]
        source: Box<EngineError>,
    },

    /// The run ended but its terminal status could not be stored.
    #[error("Failed to record terminal status ({store_error}) after: {source}")]
    TerminalStatusWrite {
        store_error: StoreError,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Terminal execution record, when the failure happened inside a run
    pub fn execution(&self) -> Option<&Execution> {
        match self {
            EngineError::ExecutionFailed { execution, .. } => Some(execution.as_ref()),
            _ => None,
        }
    }

    /// The failure that aborted the run, without the terminal-record wrappers
    pub fn root(&self) -> &EngineError {
        match self {
            EngineError::ExecutionFailed { source, .. }
            | EngineError::TerminalStatusWrite { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Failures raised by node handlers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter '{field}': expected {expected}")]
    InvalidParameter { field: String, expected: String },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout after {millis}ms")]
    Timeout { millis: u64 },
}

/// Structural problems that reject a workflow before it runs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Workflow {0} is not active")]
    NotActive(String),

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),

    #[error("Connection {connection_id} references unknown node {node_id}")]
    InvalidConnection {
        connection_id: String,
        node_id: String,
    },

    #[error("Cyclic dependency detected")]
    CyclicDependency,

    #[error("Node not found: {0}")]
    NodeNotFound(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage backend failure: {0}")]
    Backend(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("Event channel closed")]
    Closed,

    #[error("Event delivery failed: {0}")]
    Delivery(String),
}
