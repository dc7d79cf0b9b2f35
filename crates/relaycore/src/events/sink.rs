use super::{EventBus, ExecutionEvent};
use crate::{ExecutionId, ExecutionLog, ExecutionStatus, SinkError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Receiver of live execution progress
///
/// Delivery is best effort: the engine logs a failed delivery and carries on.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: ExecutionEvent) -> Result<(), SinkError>;

    async fn on_execution_update(
        &self,
        execution_id: ExecutionId,
        status: ExecutionStatus,
        output: Option<Value>,
        error: Option<String>,
    ) -> Result<(), SinkError> {
        self.publish(ExecutionEvent::execution_update(
            execution_id,
            status,
            output,
            error,
        ))
        .await
    }

    async fn on_node_log(&self, entry: &ExecutionLog) -> Result<(), SinkError> {
        self.publish(ExecutionEvent::node_log(entry)).await
    }
}

#[async_trait]
impl EventSink for EventBus {
    async fn publish(&self, event: ExecutionEvent) -> Result<(), SinkError> {
        // No subscribers is normal for headless runs
        self.emit(event);
        Ok(())
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl EventSink for NoopSink {
    async fn publish(&self, _event: ExecutionEvent) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Writes every event as a structured tracing record
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn publish(&self, event: ExecutionEvent) -> Result<(), SinkError> {
        match &event {
            ExecutionEvent::ExecutionUpdate {
                execution_id,
                status,
                error,
                ..
            } => {
                tracing::info!(%execution_id, %status, error = ?error, "execution update");
            }
            ExecutionEvent::NodeLog {
                execution_id,
                node_id,
                status,
                error,
                ..
            } => {
                tracing::info!(%execution_id, node_id = %node_id, %status, error = ?error, "node log");
            }
        }
        Ok(())
    }
}

/// Delivers each event to several sinks
///
/// Every sink is attempted; the first failure is reported afterwards.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl EventSink for FanoutSink {
    async fn publish(&self, event: ExecutionEvent) -> Result<(), SinkError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.publish(event.clone()).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
