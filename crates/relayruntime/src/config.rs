use crate::graph::CyclePolicy;
use crate::orchestrator::ExecutionSettings;
use serde::Deserialize;
use std::time::Duration;

/// Configuration for the runtime
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker tasks draining the execution pool
    pub workers: usize,
    /// Submissions that may wait for a free worker
    pub queue_capacity: usize,
    pub event_buffer_size: usize,
    pub node_timeout_ms: Option<u64>,
    pub max_node_invocations: usize,
    pub cycle_policy: CyclePolicy,
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn execution_settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            node_timeout: self.node_timeout_ms.map(Duration::from_millis),
            max_node_invocations: self.max_node_invocations,
            cycle_policy: self.cycle_policy,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 64,
            event_buffer_size: 1000,
            node_timeout_ms: None,
            max_node_invocations: 10_000,
            cycle_policy: CyclePolicy::Reject,
        }
    }
}
