//! Workflow execution runtime
//!
//! This crate provides the engine that runs workflows: the read-only graph
//! view, the handler registry, per-execution state, the depth-first
//! orchestrator and the worker pool that runs executions side by side.

mod config;
mod context;
mod graph;
mod orchestrator;
mod pool;
mod registry;
mod runtime;

pub use config::RuntimeConfig;
pub use context::ExecutionContext;
pub use graph::{CyclePolicy, WorkflowGraph};
pub use orchestrator::{ExecutionReport, ExecutionSettings, Orchestrator};
pub use pool::{ExecutionHandle, ExecutionPool};
pub use registry::{handler_fn, FnHandler, NodeRegistry};
pub use runtime::{FlowRuntime, RuntimeBuilder, WorkflowUpdate};
