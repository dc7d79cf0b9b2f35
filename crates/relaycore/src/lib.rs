//! Core abstractions for the relay workflow engine
//!
//! This crate provides the data model, the node handler contract, the error
//! taxonomy and the two collaborator interfaces (record store and event sink)
//! that the runtime is composed from. It knows nothing about traversal.

mod error;
pub mod events;
mod execution;
mod node;
pub mod store;
mod workflow;

pub use error::{EngineError, NodeError, SinkError, StoreError, WorkflowError};
pub use events::{
    EventBus, EventSink, ExecutionEvent, FanoutSink, NoopSink, TracingSink,
};
pub use execution::{
    Execution, ExecutionId, ExecutionLog, ExecutionStatus, NewExecutionLog, NodeResult,
    NodeStatus,
};
pub use node::{NodeContext, NodeHandler, NodeMetadata, NodeOutput};
pub use store::{MemoryStore, RecordStore};
pub use workflow::{
    Connection, NodeId, NodeSpec, Position, Workflow, WorkflowId, WorkflowStatus,
};

/// Payloads flowing between nodes are plain JSON documents
pub type Payload = serde_json::Value;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
