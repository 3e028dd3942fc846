//! Node-execution runtime
//!
//! This crate turns a single node's dispatch request into a completed,
//! retried or deferred outcome: executor registry, ordered decorator
//! pipeline, cancellable gateway with task registry, and the generic
//! keyed resource pool shared by executors.

mod gateway;
mod pipeline;
mod registry;
mod resource;
mod runtime;
mod tasks;

pub use gateway::{ExecutionFuture, ExecutionGateway};
pub use pipeline::{
    DecoratorPipeline, DispatchRoute, ExceptionDecorator, ExecutionDecorator, Invocation,
    InvocationFuture, ResilienceDecorator, ValidationDecorator, EXCEPTION_ORDER,
    RESILIENCE_ORDER, VALIDATION_ORDER,
};
pub use registry::ExecutorRegistry;
pub use resource::{ResourceFactory, ResourceHub, ResourceHubBuilder, ResourceManager};
pub use runtime::{EngineRuntime, RuntimeConfig};
pub use tasks::{TaskHandle, TaskRegistry};
