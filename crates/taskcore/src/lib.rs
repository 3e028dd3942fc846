//! Core abstractions for the node-execution engine
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on: the result protocol the graph walker consumes,
//! the executor contract, the per-dispatch context and envelope, the
//! execution policy, and the trace bus.

mod context;
mod error;
mod executor;
mod policy;
mod result;
mod trace;
mod value;

pub use context::{
    ExecutionContext, ExecutionTaskEnvelope, NoResources, ResourceAccessor, TaskId,
};
pub use error::{EngineError, ErrorKind, ExecutorError, ResourceError};
pub use executor::{ExecutorType, NodeDefinition, NodeExecutor, ValidationResult};
pub use policy::{
    Backoff, DefaultPolicyResolver, PolicyResolver, ResolvedExecutionPolicy, RetryPolicy,
};
pub use result::{ExecutionResult, ExecutionStatus, LoopState, OutputMap};
pub use trace::{RunId, TraceBus, TraceEmitter, TraceEvent, TraceLevel, WorkflowId};
pub use value::Value;
