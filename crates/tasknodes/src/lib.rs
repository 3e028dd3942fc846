//! Representative node executors
//!
//! Control-flow executors (branch and loop), an HTTP request executor
//! backed by the pooled client factory, and a delay executor. Each is a
//! `NodeExecutor` the runtime's registry routes to by identifier.

mod branch;
mod client_pool;
pub mod condition;
mod delay;
mod http;
mod loops;

pub use branch::{IfExecutor, SwitchExecutor};
pub use client_pool::{client_key, HttpClientFactory};
pub use delay::DelayExecutor;
pub use http::HttpRequestExecutor;
pub use loops::{loop_state_value, ForLoopExecutor, WhileLoopExecutor, LOOP_STATE_KEY};

use std::sync::Arc;
use taskruntime::ExecutorRegistry;

/// Register every executor in this crate.
pub fn register_standard_executors(registry: &mut ExecutorRegistry) {
    registry.register(Arc::new(IfExecutor));
    registry.register(Arc::new(SwitchExecutor));
    registry.register(Arc::new(ForLoopExecutor));
    registry.register(Arc::new(WhileLoopExecutor));
    registry.register(Arc::new(HttpRequestExecutor));
    registry.register(Arc::new(DelayExecutor));
}
