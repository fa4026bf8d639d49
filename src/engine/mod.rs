//! Deadline engine: the serialized run loop, the bounded worker pool, and
//! the per-contract cancellation protocol.
//!
//! This module provides the main scheduling loop that dispatches contracts
//! to workers and resolves races between enqueue, dispatch, completion, and
//! pruning on a single logical thread of control.

mod engine;
mod types;
mod worker;

pub use engine::Engine;
pub use types::{EngineError, EngineState};
