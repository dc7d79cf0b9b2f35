//! Standard node library
//!
//! Built-in handlers for the node types workflows reference by tag

mod ai;
mod comms;
mod data;
pub mod expr;
mod flow;
mod http;
mod transform;
mod trigger;

pub use ai::OpenAiNode;
pub use comms::EmailSendNode;
pub use data::PostgresNode;
pub use flow::IfNode;
pub use http::HttpRequestNode;
pub use transform::{CodeNode, SetNode};
pub use trigger::{ScheduleTriggerNode, WebhookTriggerNode};

use relayruntime::NodeRegistry;
use std::sync::Arc;

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut NodeRegistry) {
    registry.register(Arc::new(WebhookTriggerNode));
    registry.register(Arc::new(ScheduleTriggerNode));
    registry.register(Arc::new(HttpRequestNode::new()));
    registry.register(Arc::new(CodeNode));
    registry.register(Arc::new(SetNode));
    registry.register(Arc::new(IfNode));
    registry.register(Arc::new(EmailSendNode));
    registry.register(Arc::new(PostgresNode));
    registry.register(Arc::new(OpenAiNode::new()));
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
