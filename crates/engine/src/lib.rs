//! In-process logic that sits between the HTTP layer and the store: the
//! order and corridor state machines, their transactional side effects, and
//! the process-wide fan-out primitives (batch writer, subscription fabric)
//! that make the hot path fast without weakening its guarantees.

pub mod batch_writer;
pub mod conversion;
pub mod corridor_engine;
pub mod error;
pub mod invariant;
pub mod order_engine;
pub mod state_machine;
pub mod subscription;

pub use {
    batch_writer::BatchWriter,
    corridor_engine::CorridorEngine,
    error::{ConversionError, CorridorError, OrderError},
    order_engine::{OrderEngine, corridor_buyer},
    subscription::SubscriptionFabric,
};
