pub mod distributed_tracing;
pub mod metrics;
pub mod panic_hook;
pub mod tracing;
