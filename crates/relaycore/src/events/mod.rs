// crates/relaycore/src/events/mod.rs

mod base;
mod sink;

pub use base::{EventBus, ExecutionEvent};
pub use sink::{EventSink, FanoutSink, NoopSink, TracingSink};
